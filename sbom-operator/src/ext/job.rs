use k8s_openapi::api::batch::v1::Job;

use crate::job::JobOutcome;

/// Accessors the job controller needs on a [`Job`].
pub trait JobExt {
    /// The job's state. A job without status is pending.
    fn outcome(&self) -> JobOutcome;
}

impl JobExt for Job {
    fn outcome(&self) -> JobOutcome {
        self.status.as_ref().map_or(JobOutcome::Pending, |status| {
            JobOutcome::from_counters(
                status.active.unwrap_or_default(),
                status.succeeded.unwrap_or_default(),
                status.failed.unwrap_or_default(),
            )
        })
    }
}
