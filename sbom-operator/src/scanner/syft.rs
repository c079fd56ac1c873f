//! Scanner that shells out to the `syft` binary.

use std::{path::PathBuf, process::Stdio};

use snafu::{ResultExt, ensure};
use tokio::process::Command;

use super::{Error, Sbom, Scanner, error};
use crate::{config::SbomFormat, inventory::ContainerImage, registry::CredentialResolver};

const REGISTRY_AUTH_AUTHORITY: &str = "SYFT_REGISTRY_AUTH_AUTHORITY";
const REGISTRY_AUTH_USERNAME: &str = "SYFT_REGISTRY_AUTH_USERNAME";
const REGISTRY_AUTH_PASSWORD: &str = "SYFT_REGISTRY_AUTH_PASSWORD";

/// Runs `syft` against the registry copy of an image.
pub struct SyftScanner<R> {
    syft_path: PathBuf,
    format: SbomFormat,
    resolver: R,
}

impl<R> SyftScanner<R> {
    /// Creates a scanner running the executable at `syft_path`.
    pub const fn new(syft_path: PathBuf, format: SbomFormat, resolver: R) -> Self {
        Self { syft_path, format, resolver }
    }

    /// `registry:<image> --output <format> --quiet`
    fn arguments(&self, image: &ContainerImage) -> [String; 4] {
        [
            format!("registry:{}", image.image_id),
            "--output".to_string(),
            self.format.syft_output().to_string(),
            "--quiet".to_string(),
        ]
    }
}

impl<R: CredentialResolver> Scanner for SyftScanner<R> {
    async fn scan(&self, image: &ContainerImage) -> Result<Sbom, Error> {
        let credentials = self.resolver.resolve(image).await.with_context(|_| {
            error::ResolveCredentialsSnafu { image: image.image_id.clone() }
        })?;
        let auth_envs = (!credentials.is_anonymous())
            .then(|| {
                [
                    (REGISTRY_AUTH_AUTHORITY, credentials.host),
                    (REGISTRY_AUTH_USERNAME, credentials.username),
                    (REGISTRY_AUTH_PASSWORD, credentials.password),
                ]
            })
            .into_iter()
            .flatten();

        tracing::debug!("Scanning {} with {}", image.image_id, self.syft_path.display());
        let output = Command::new(&self.syft_path)
            .args(self.arguments(image))
            .envs(auth_envs)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|_| error::SpawnScannerSnafu { syft_path: self.syft_path.clone() })?;

        ensure!(
            output.status.success(),
            error::ScannerFailedSnafu {
                image: image.image_id.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );

        Ok(Sbom { format: self.format, content: output.stdout })
    }
}
