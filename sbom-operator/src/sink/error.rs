use std::path::PathBuf;

use snafu::Snafu;

use crate::config::SbomFormat;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Target {target} requires '{key}' to be configured"))]
    MissingConfig { target: &'static str, key: &'static str },

    #[snafu(display("Target {target} does not accept SBOMs in the {format} format"))]
    UnsupportedFormat { target: &'static str, format: SbomFormat },

    #[snafu(display("Failed to run git, error: {source}"))]
    SpawnGit { source: std::io::Error },

    #[snafu(display("git {command} exited with {status}: {stderr}"))]
    GitCommand { command: String, status: std::process::ExitStatus, stderr: String },

    #[snafu(display("Failed to create directory {}, error: {source}", path.display()))]
    CreateDirectory { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to write SBOM to {}, error: {source}", path.display()))]
    WriteSbom { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to remove stale SBOMs under {}, error: {source}", path.display()))]
    PruneSboms { path: PathBuf, source: std::io::Error },

    #[snafu(display("Stale SBOM removal was interrupted, error: {source}"))]
    JoinPrune { source: tokio::task::JoinError },

    #[snafu(display("Failed to build HTTP client, error: {source}"))]
    BuildHttpClient { source: reqwest::Error },

    #[snafu(display("Failed to upload SBOM of {image}, error: {source}"))]
    UploadSbom { image: String, source: reqwest::Error },

    #[snafu(display("Upload of SBOM of {image} was rejected with {status}: {body}"))]
    UploadRejected { image: String, status: reqwest::StatusCode, body: String },
}
