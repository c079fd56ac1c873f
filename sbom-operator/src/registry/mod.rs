//! Registry credential resolution.
//!
//! Credentials are looked up in the image pull secrets declared by the pods
//! running an image, the same secrets the kubelet uses to pull it.

mod docker_config;
mod error;

use snafu::ResultExt;

use self::docker_config::find_credentials;
pub use self::error::Error;
use crate::{
    cluster::ClusterApi,
    inventory::{ContainerImage, PullSecretRef},
};

/// Canonical key of Docker Hub, also the host of unqualified images.
const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_ALIASES: [&str; 3] =
    ["index.docker.io", "registry-1.docker.io", "registry.hub.docker.com"];

/// Credentials for one registry. Empty username and password mean anonymous
/// access.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegistryCredentials {
    /// Normalized registry host, e.g. `ghcr.io` or `docker.io`.
    pub host: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    /// Anonymous access to `host`.
    pub fn anonymous(host: impl Into<String>) -> Self {
        Self { host: host.into(), ..Self::default() }
    }

    /// Whether neither a username nor a password is set.
    pub fn is_anonymous(&self) -> bool { self.username.is_empty() && self.password.is_empty() }
}

/// Finds the credentials needed to pull an image.
pub trait CredentialResolver {
    /// Resolves the credentials for the registry of `image`, falling back to
    /// anonymous access when none are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced secret cannot be read or is malformed.
    async fn resolve(&self, image: &ContainerImage) -> Result<RegistryCredentials, Error>;
}

/// Resolves credentials from the pull secrets referenced by an image's pods.
#[derive(Clone)]
pub struct PullSecretResolver<C> {
    cluster: C,
}

impl<C> PullSecretResolver<C> {
    /// Creates a resolver reading secrets through `cluster`.
    pub const fn new(cluster: C) -> Self { Self { cluster } }
}

impl<C: ClusterApi> CredentialResolver for PullSecretResolver<C> {
    async fn resolve(&self, image: &ContainerImage) -> Result<RegistryCredentials, Error> {
        let host = registry_host(&image.image_id);

        for PullSecretRef { namespace, name } in &image.pull_secrets {
            let secret = self.cluster.get_secret(namespace, name).await.with_context(|_| {
                error::GetPullSecretSnafu { namespace: namespace.clone(), name: name.clone() }
            })?;
            let Some(secret) = secret else {
                tracing::warn!("Pull secret {namespace}/{name} does not exist, skipping");
                continue;
            };

            if let Some(credentials) = find_credentials(&secret, namespace, name, &host)? {
                return Ok(credentials);
            }
        }

        tracing::debug!(
            "No pull secret matches registry {host}, pulling {} anonymously",
            image.image_id
        );
        Ok(RegistryCredentials::anonymous(host))
    }
}

/// The registry an image reference points to. References without an explicit
/// registry resolve to Docker Hub.
pub fn registry_host(image: &str) -> String {
    match image.split_once('/') {
        Some((first, _)) if first.contains(['.', ':']) || first == "localhost" => {
            normalize_registry(first)
        }
        _ => DOCKER_HUB.to_string(),
    }
}

/// Reduces a docker config key such as `https://index.docker.io/v1/` to the
/// bare registry host.
fn normalize_registry(registry: &str) -> String {
    let registry = registry
        .strip_prefix("https://")
        .or_else(|| registry.strip_prefix("http://"))
        .unwrap_or(registry);
    let host = registry.split('/').next().unwrap_or(registry);

    if DOCKER_HUB_ALIASES.contains(&host) { DOCKER_HUB.to_string() } else { host.to_string() }
}
