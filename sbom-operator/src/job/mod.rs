//! Delegated execution: all pending images are handed to a short-lived batch
//! job instead of being scanned by the operator itself.
//!
//! The job receives its work list through a secret mounted into the pod, one
//! [`ImageConfig`] per image, and is expected to run the scanner, feed the
//! sinks and exit. The operator only watches the job's status counters.

mod env;
mod error;
mod manifest;
mod outcome;
mod payload;

use std::time::Duration;

use k8s_openapi::api::core::v1::EnvVar;
use snafu::ResultExt;

pub use self::{
    env::{forwarded_envs, utf8_vars},
    error::Error,
    outcome::JobOutcome,
    payload::ImageConfig,
};
use crate::{
    cluster::BatchApi, consts::JOB_POLL_INTERVAL, inventory::ContainerImage,
    registry::CredentialResolver,
};

/// How delegated jobs are created.
#[derive(Clone, Debug)]
pub struct JobSettings {
    /// Image of the job container. It has to run the scanner and the sinks
    /// itself.
    pub image: String,
    /// Pull secret for the job image, in the job namespace.
    pub image_pull_secret: Option<String>,
    /// Becomes the job's `activeDeadlineSeconds`. This is the only bound on
    /// how long a delegated run waits.
    pub timeout: Duration,

    /// Namespace the secret and the job are created in.
    pub namespace: String,

    /// Environment passed to the job container.
    pub env: Vec<EnvVar>,

    /// Pause between two reads of the job status.
    pub poll_interval: Duration,
}

impl JobSettings {
    /// Settings with the default deadline, no pull secret and no forwarded
    /// environment.
    pub fn new(image: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            image_pull_secret: None,
            timeout: Duration::from_secs(sbom_operator_base::consts::DEFAULT_JOB_TIMEOUT_SECS),
            namespace: namespace.into(),
            env: Vec::new(),
            poll_interval: JOB_POLL_INTERVAL,
        }
    }
}

/// A submitted job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobHandle {
    /// Namespace the secret and the job live in.
    pub namespace: String,
    /// Name of the job.
    pub name: String,
}

/// Submits delegated scan jobs and waits for them.
pub struct JobController<R> {
    resolver: R,
    settings: JobSettings,
}

impl<R: CredentialResolver> JobController<R> {
    /// Creates a controller resolving pull credentials with `resolver`.
    pub const fn new(resolver: R, settings: JobSettings) -> Self { Self { resolver, settings } }

    /// Creates the payload secret and the job for `images`.
    ///
    /// # Errors
    ///
    /// Credential resolution is all or nothing: if any image fails, nothing is
    /// created.
    pub async fn submit<C: BatchApi>(
        &self,
        cluster: &C,
        images: &[&ContainerImage],
    ) -> Result<JobHandle, Error> {
        let mut configs = Vec::with_capacity(images.len());
        for &image in images {
            let credentials = self.resolver.resolve(image).await.with_context(|_| {
                error::ResolveCredentialsSnafu { image: image.image_id.clone() }
            })?;
            configs.push(ImageConfig::new(image, credentials));
        }
        let payload = serde_json::to_string(&configs).context(error::SerializePayloadSnafu)?;

        let suffix = object_suffix();
        let namespace = &self.settings.namespace;

        cluster
            .apply_secret(namespace, &manifest::build_secret(&suffix, namespace, payload))
            .await
            .context(error::CreateSecretSnafu)?;

        let job = manifest::build_job(&suffix, &self.settings);
        cluster.apply_job(namespace, &job).await.context(error::CreateJobSnafu)?;

        let handle = JobHandle { namespace: namespace.clone(), name: manifest::job_name(&suffix) };
        tracing::info!(
            "Created job {} in namespace {} for {} images",
            handle.name,
            handle.namespace,
            configs.len()
        );
        Ok(handle)
    }

    /// Polls the job until it reaches a terminal state and reports whether it
    /// succeeded. A failed status read counts as failure.
    pub async fn wait<C: BatchApi>(&self, cluster: &C, handle: &JobHandle) -> bool {
        loop {
            match cluster.job_outcome(&handle.namespace, &handle.name).await {
                Ok(JobOutcome::Succeeded) => {
                    tracing::info!("Job {} succeeded", handle.name);
                    return true;
                }
                Ok(JobOutcome::Failed) => {
                    tracing::warn!("Job {} failed", handle.name);
                    return false;
                }
                Ok(outcome) => {
                    tracing::debug!("Job {} is {outcome}", handle.name);
                }
                Err(err) => {
                    tracing::warn!("Error while waiting for job {}, error: {err}", handle.name);
                    return false;
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

/// Timestamp suffix shared by the secret and the job of one run.
fn object_suffix() -> String { chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string() }
