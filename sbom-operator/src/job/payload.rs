use serde::{Deserialize, Serialize};

use crate::{inventory::ContainerImage, registry::RegistryCredentials};

/// One image the delegated job has to scan, together with the credentials
/// needed to pull it and the pods it has to report back for.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImageConfig {
    /// Registry the image is pulled from.
    #[serde(rename = "registry-host")]
    pub host: String,

    /// Empty for anonymous pulls.
    #[serde(rename = "registry-user")]
    pub user: String,

    #[serde(rename = "registry-password")]
    pub password: String,

    /// Image id, digest included when known.
    pub image: String,

    /// Every pod running the image, once each.
    pub pods: Vec<ImagePod>,
}

/// A pod running the image, as reported back by the job.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImagePod {
    pub pod: String,
    pub namespace: String,
    pub cluster: String,
}

impl ImageConfig {
    /// Builds the record of `image`, listing each pod once even when several
    /// of its containers run the image.
    pub fn new(image: &ContainerImage, credentials: RegistryCredentials) -> Self {
        let RegistryCredentials { host, username, password } = credentials;

        let mut pods = Vec::with_capacity(image.pods.len());
        for reference in &image.pods {
            let pod = ImagePod {
                pod: reference.name.clone(),
                namespace: reference.namespace.clone(),
                cluster: reference.cluster.clone(),
            };
            if !pods.contains(&pod) {
                pods.push(pod);
            }
        }

        Self { host, user: username, password, image: image.image_id.clone(), pods }
    }
}
