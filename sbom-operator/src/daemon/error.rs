use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Cron expression '{expression}' cannot be parsed, error: {source}"))]
    InvalidSchedule { expression: String, source: cron::error::Error },

    #[snafu(display("Invalid configuration of target {name}, error: {source}"))]
    ValidateSink { name: String, source: crate::sink::Error },

    #[snafu(display("Failed to initialize target {name}, error: {source}"))]
    InitializeSink { name: String, source: crate::sink::Error },

    #[snafu(display("Failed to discover container images, error: {source}"))]
    DiscoverImages { source: crate::cluster::Error },

    #[snafu(display("Failed to submit scan job, error: {source}"))]
    SubmitJob {
        #[snafu(source(from(crate::job::Error, Box::new)))]
        source: Box<crate::job::Error>,
    },
}

impl Error {
    /// Whether the error has to stop the operator rather than only the
    /// current run.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidSchedule { .. } | Self::ValidateSink { .. } | Self::InitializeSink { .. }
        )
    }
}
