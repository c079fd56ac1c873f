use serde::{Deserialize, Serialize};

/// Delegated execution. An empty image keeps scanning in-process.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Image of the scan job. Setting it switches to delegated execution.
    #[serde(default)]
    pub image: String,

    /// Pull secret for the job image, in the job namespace.
    #[serde(default)]
    pub image_pull_secret: Option<String>,

    /// Deadline of the job, in seconds.
    #[serde(default = "JobConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    /// Namespace the job runs in. Falls back to the operator's own namespace.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            image_pull_secret: None,
            timeout_secs: Self::default_timeout_secs(),
            namespace: None,
        }
    }
}

impl JobConfig {
    #[inline]
    #[must_use]
    pub const fn default_timeout_secs() -> u64 {
        sbom_operator_base::consts::DEFAULT_JOB_TIMEOUT_SECS
    }

    /// Whether scans are delegated to batch jobs.
    pub const fn is_enabled(&self) -> bool { !self.image.is_empty() }
}
