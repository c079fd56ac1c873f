use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to resolve registry credentials of {image}, error: {source}"))]
    ResolveCredentials {
        image: String,
        #[snafu(source(from(crate::registry::Error, Box::new)))]
        source: Box<crate::registry::Error>,
    },

    #[snafu(display("Failed to run {}, error: {source}", syft_path.display()))]
    SpawnScanner { syft_path: PathBuf, source: std::io::Error },

    #[snafu(display("Scanner exited with {status} while scanning {image}: {stderr}"))]
    ScannerFailed { image: String, status: std::process::ExitStatus, stderr: String },
}
