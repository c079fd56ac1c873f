//! Access to the Kubernetes control plane.
//!
//! The operator only needs a handful of calls, split into two traits so the
//! run orchestrator can be driven by an in-memory cluster in tests:
//! [`ClusterApi`] covers discovery, annotations and pull secrets, while
//! [`BatchApi`] covers the resources of a delegated job.

mod error;
mod kube_cluster;

use k8s_openapi::api::{
    batch::v1::Job,
    core::v1::{Pod, Secret},
};

pub use self::{error::Error, kube_cluster::KubeCluster};
use crate::{inventory::PodReference, job::JobOutcome};

/// Read access to namespaces, pods and secrets, plus the pod annotation that
/// marks an image as catalogued.
pub trait ClusterApi {
    /// Names of the namespaces matching `label_selector`. An empty selector
    /// matches every namespace.
    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<String>, Error>;

    /// Pods of `namespace` matching `label_selector`. An empty selector matches
    /// every pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the API server rejects the listing.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, Error>;

    /// Records on the pod that `image_id` has been catalogued for the
    /// referenced container.
    async fn annotate_pod(&self, pod: &PodReference, image_id: &str) -> Result<(), Error>;

    /// Reads a secret, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than the secret being absent.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;
}

/// Write access to the resources of a delegated scan job.
pub trait BatchApi {
    /// Creates the secret or updates it in place.
    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error>;

    /// Creates the job or updates it in place.
    async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), Error>;

    /// Reads the status counters of a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the job cannot be read, including when it has been
    /// deleted.
    async fn job_outcome(&self, namespace: &str, name: &str) -> Result<JobOutcome, Error>;
}
