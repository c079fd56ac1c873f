//! Configuration and initialization for application logging.
//!
//! This module provides the `LogConfig` struct for defining logging
//! preferences, such as output targets (stdout, stderr, file), the line format
//! and the log level. The operator runs inside a cluster, so JSON lines are
//! available alongside the human friendly pretty format.
use std::{fmt, fs::OpenOptions, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use snafu::Snafu;
use tracing_subscriber::{
    Layer, fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Represents the configuration for the application's logging system.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Optional path to a file where logs should be written.
    #[serde(default = "LogConfig::default_file_path")]
    pub file_path: Option<PathBuf>,

    /// A boolean indicating whether logs should be emitted to standard output.
    #[serde(default = "LogConfig::default_emit_stdout")]
    pub emit_stdout: bool,

    /// A boolean indicating whether logs should be emitted to standard error.
    #[serde(default = "LogConfig::default_emit_stderr")]
    pub emit_stderr: bool,

    /// Line format shared by every emitter.
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub format: LogFormat,

    /// The minimum log level to be recorded.
    #[serde(default = "LogConfig::default_log_level")]
    #[serde_as(as = "DisplayFromStr")]
    pub level: tracing::Level,
}

impl Default for LogConfig {
    /// By default, logs are set to `INFO` level and emitted to `stdout` in the
    /// pretty format.
    fn default() -> Self {
        Self {
            file_path: Self::default_file_path(),
            emit_stdout: Self::default_emit_stdout(),
            emit_stderr: Self::default_emit_stderr(),
            format: LogFormat::default(),
            level: Self::default_log_level(),
        }
    }
}

impl LogConfig {
    #[inline]
    #[must_use]
    pub const fn default_log_level() -> tracing::Level { tracing::Level::INFO }

    #[inline]
    #[must_use]
    pub const fn default_file_path() -> Option<PathBuf> { None }

    #[inline]
    #[must_use]
    pub const fn default_emit_stdout() -> bool { true }

    #[inline]
    #[must_use]
    pub const fn default_emit_stderr() -> bool { false }

    /// Initializes the global `tracing` subscriber registry based on this
    /// `LogConfig`.
    ///
    /// # Panics
    ///
    /// This method panics if called more than once in the same application
    /// lifetime, as `tracing_subscriber::util::SubscriberInitExt::init()`
    /// will panic if a global subscriber is already set.
    pub fn registry(&self) {
        let Self { file_path, emit_stdout, emit_stderr, format, level } = self;

        let filter_layer = tracing_subscriber::filter::LevelFilter::from_level(*level);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(file_path.clone().and_then(|path| LogDriver::File(path).layer(*format)))
            .with(emit_stdout.then(|| LogDriver::Stdout.layer(*format)).flatten())
            .with(emit_stderr.then(|| LogDriver::Stderr.layer(*format)).flatten())
            .init();
    }
}

/// Line format of emitted log records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn layer<S, W>(self, writer: W) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let fmt = tracing_subscriber::fmt::layer().with_writer(writer);
        match self {
            Self::Pretty => Box::new(fmt.pretty().with_thread_ids(true).with_thread_names(true)),
            Self::Json => Box::new(fmt.json().with_current_span(true)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ParseLogFormatError::Invalid { value: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseLogFormatError {
    #[snafu(display("'{value}' is not a valid log format, expected 'pretty' or 'json'"))]
    Invalid { value: String },
}

/// Enumerates the possible log output drivers.
#[derive(Clone, Debug)]
enum LogDriver {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogDriver {
    /// Creates a `tracing_subscriber::Layer` for the specific log driver.
    ///
    /// Returns `None` if the log file cannot be opened for appending.
    fn layer<S>(self, format: LogFormat) -> Option<Box<dyn Layer<S> + Send + Sync + 'static>>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        match self {
            Self::Stdout => Some(format.layer(std::io::stdout)),
            Self::Stderr => Some(format.layer(std::io::stderr)),
            Self::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
                Some(format.layer(file))
            }
        }
    }
}
