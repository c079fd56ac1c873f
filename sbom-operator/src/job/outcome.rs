use std::fmt;

/// Terminal or transient state of a delegated job, derived from its status
/// counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobOutcome {
    /// No pod has started yet.
    Pending,
    /// At least one pod is active.
    Running,
    /// No pod is active and one succeeded.
    Succeeded,
    /// No pod is active and one failed. With a backoff limit of zero this is
    /// final.
    Failed,
}

impl JobOutcome {
    /// Derives the outcome from the `active`, `succeeded` and `failed` counters
    /// of a job status.
    pub const fn from_counters(active: i32, succeeded: i32, failed: i32) -> Self {
        if active > 0 {
            Self::Running
        } else if succeeded > 0 {
            Self::Succeeded
        } else if failed > 0 {
            Self::Failed
        } else {
            Self::Pending
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}
