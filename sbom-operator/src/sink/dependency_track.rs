//! Uploads SBOMs to a Dependency-Track server.

use base64::Engine;
use serde::Serialize;
use snafu::{ResultExt, ensure};

use super::{Error, Sink, error};
use crate::{
    config::{DependencyTrackConfig, SbomFormat},
    inventory::ContainerImage,
    scanner::Sbom,
};

const NAME: &str = "dtrack";
/// Header carrying the API key on every request.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Uploads CycloneDX SBOMs to a Dependency-Track server, one project per
/// image repository and one version per digest or tag.
pub struct DependencyTrackTarget {
    client: reqwest::Client,
    base_url: String,
    upload_url: String,
    api_key: String,
    format: SbomFormat,
}

/// Body of `PUT /api/v1/bom`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BomUpload<'a> {
    project_name: &'a str,
    project_version: &'a str,
    auto_create: bool,
    bom: String,
}

impl DependencyTrackTarget {
    /// Creates the sink with its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: &DependencyTrackConfig, format: SbomFormat) -> Result<Self, Error> {
        let client = reqwest::Client::builder().build().context(error::BuildHttpClientSnafu)?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            upload_url: format!("{base_url}/api/v1/bom"),
            base_url,
            api_key: config.api_key.clone(),
            format,
        })
    }
}

impl Sink for DependencyTrackTarget {
    fn name(&self) -> &str { NAME }

    fn validate_config(&self) -> Result<(), Error> {
        ensure!(
            !self.base_url.is_empty(),
            error::MissingConfigSnafu { target: NAME, key: "dtrack.baseUrl" }
        );
        ensure!(
            !self.api_key.is_empty(),
            error::MissingConfigSnafu { target: NAME, key: "dtrack.apiKey" }
        );
        ensure!(
            self.format.is_cyclonedx(),
            error::UnsupportedFormatSnafu { target: NAME, format: self.format }
        );
        Ok(())
    }

    async fn initialize(&self) -> Result<(), Error> {
        tracing::debug!("Uploading SBOMs to {}", self.base_url);
        Ok(())
    }

    async fn process_sbom(&self, image: &ContainerImage, sbom: &Sbom) -> Result<(), Error> {
        ensure!(
            sbom.format.is_cyclonedx(),
            error::UnsupportedFormatSnafu { target: NAME, format: sbom.format }
        );

        let (project_name, project_version) = image.name_and_version();
        let upload = BomUpload {
            project_name,
            project_version,
            auto_create: true,
            bom: base64::engine::general_purpose::STANDARD.encode(&sbom.content),
        };

        let response = self
            .client
            .put(&self.upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&upload)
            .send()
            .await
            .with_context(|_| error::UploadSbomSnafu { image: image.image_id.clone() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return error::UploadRejectedSnafu { image: image.image_id.clone(), status, body }
                .fail();
        }

        tracing::debug!("Uploaded SBOM of {project_name}:{project_version} to Dependency-Track");
        Ok(())
    }

    async fn cleanup(&self, _all_images: &[ContainerImage]) -> Result<(), Error> {
        // Projects of images that are gone keep their history.
        tracing::debug!("Dependency-Track projects are left untouched on cleanup");
        Ok(())
    }
}
