use k8s_openapi::api::core::v1::Pod;
use sbom_operator_base::consts::k8s::annotations;

/// Prefixes container runtimes put in front of the image id.
const RUNTIME_PREFIXES: [&str; 2] = ["docker-pullable://", "docker://"];

/// A started container together with the identity of the image it runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerImageStatus {
    /// Name of the container.
    pub container: String,
    /// Image id with runtime prefixes stripped.
    pub image_id: String,
}

/// Accessors the inventory needs on a [`Pod`].
pub trait PodExt {
    /// Every container that reports an image id, init containers included.
    fn container_images(&self) -> Vec<ContainerImageStatus>;

    /// The image id recorded by the last successful run for `container`.
    fn processed_image(&self, container: &str) -> Option<&str>;

    /// Names of the declared image pull secrets, in the pod's namespace.
    fn image_pull_secret_names(&self) -> Vec<String>;
}

impl PodExt for Pod {
    fn container_images(&self) -> Vec<ContainerImageStatus> {
        self.status
            .iter()
            .flat_map(|status| {
                status
                    .init_container_statuses
                    .iter()
                    .flatten()
                    .chain(status.container_statuses.iter().flatten())
            })
            .filter_map(|status| {
                normalize_image_id(&status.image_id, &status.image).map(|image_id| {
                    ContainerImageStatus { container: status.name.clone(), image_id }
                })
            })
            .collect()
    }

    fn processed_image(&self, container: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()?
            .get(&annotations::processed_key(container))
            .map(String::as_str)
    }

    fn image_pull_secret_names(&self) -> Vec<String> {
        self.spec
            .iter()
            .flat_map(|spec| spec.image_pull_secrets.iter().flatten())
            .map(|reference| reference.name.clone())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Strips runtime prefixes. A bare digest carries no repository, so the
/// status `image` reference is used instead.
fn normalize_image_id(image_id: &str, image: &str) -> Option<String> {
    let image_id = RUNTIME_PREFIXES
        .iter()
        .find_map(|prefix| image_id.strip_prefix(prefix))
        .unwrap_or(image_id);

    if image_id.is_empty() {
        None
    } else if image_id.starts_with("sha256:") {
        // Locally built images carry no repository digest.
        (!image.is_empty()).then(|| image.to_string())
    } else {
        Some(image_id.to_string())
    }
}
