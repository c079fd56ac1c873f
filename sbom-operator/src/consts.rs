use std::time::Duration;

/// Interval between two reads of a delegated job's status.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Prefix of process environment variables forwarded into the delegated job.
pub const JOB_ENV_PREFIX: &str = "SBOM_JOB_";

/// Name prefix of delegated jobs and their `app.kubernetes.io/name` label.
pub const JOB_NAME: &str = "sbom-operator-job";
/// Name prefix of the payload secrets.
pub const JOB_SECRET_NAME: &str = "sbom-operator-job-config";
pub const JOB_CONTAINER_NAME: &str = "sbom-operator-job";
pub const JOB_CONFIG_VOLUME: &str = "config";
/// Directory the payload secret is mounted at in the job container.
pub const JOB_CONFIG_MOUNT_PATH: &str = "/sbom-operator";
/// Key of the image payload inside the job secret.
pub const JOB_CONFIG_KEY: &str = "image-config.json";

/// Field manager of server-side applies.
pub const FIELD_MANAGER: &str = "sbom-operator";
