//! This module provides extensions to Kubernetes API types.
//!
//! It introduces traits implemented on `k8s_openapi` types, such as `Pod` and
//! `Job`, that extract what the operator needs from them.

mod job;
mod pod;

pub use self::{
    job::JobExt,
    pod::{ContainerImageStatus, PodExt},
};
