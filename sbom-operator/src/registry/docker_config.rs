//! Reading credentials out of `.dockerconfigjson` documents.

use std::collections::BTreeMap;

use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};

use super::{RegistryCredentials, error, normalize_registry};

/// Data key of `kubernetes.io/dockerconfigjson` secrets.
const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
/// Data key of legacy `kubernetes.io/dockercfg` secrets.
const DOCKER_CFG_KEY: &str = ".dockercfg";

/// `~/.docker/config.json` layout, as stored in `kubernetes.io/dockerconfigjson`
/// secrets.
#[derive(Debug, Default, Deserialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    username: Option<String>,

    #[serde(default)]
    password: Option<String>,

    #[serde(default)]
    auth: Option<String>,
}

/// Looks up the credentials for `host` in a pull secret. Both the current
/// `.dockerconfigjson` and the legacy `.dockercfg` layouts are understood.
pub(super) fn find_credentials(
    secret: &Secret,
    namespace: &str,
    name: &str,
    host: &str,
) -> Result<Option<RegistryCredentials>, error::Error> {
    let Some(data) = secret.data.as_ref() else {
        return Ok(None);
    };

    let auths = if let Some(raw) = data.get(DOCKER_CONFIG_JSON_KEY) {
        serde_json::from_slice::<DockerConfigJson>(&raw.0)
            .map(|config| config.auths)
            .with_context(|_| error::ParseDockerConfigSnafu { namespace, name })?
    } else if let Some(raw) = data.get(DOCKER_CFG_KEY) {
        serde_json::from_slice::<BTreeMap<String, AuthEntry>>(&raw.0)
            .with_context(|_| error::ParseDockerConfigSnafu { namespace, name })?
    } else {
        return Ok(None);
    };

    let Some(entry) = auths
        .into_iter()
        .find_map(|(registry, entry)| (normalize_registry(&registry) == host).then_some(entry))
    else {
        return Ok(None);
    };

    let (username, password) = match entry {
        AuthEntry { username: Some(username), password: Some(password), .. } => {
            (username, password)
        }
        AuthEntry { auth: Some(auth), .. } => decode_auth(&auth, namespace, name)?,
        _ => return Ok(None),
    };

    Ok(Some(RegistryCredentials { host: host.to_string(), username, password }))
}

/// Splits a base64 `user:password` pair.
fn decode_auth(
    auth: &str,
    namespace: &str,
    name: &str,
) -> Result<(String, String), error::Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth.trim())
        .with_context(|_| error::DecodeAuthSnafu { namespace, name })?;
    let decoded = String::from_utf8_lossy(&decoded);
    let (username, password) =
        decoded.split_once(':').context(error::MalformedAuthSnafu { namespace, name })?;
    Ok((username.to_string(), password.to_string()))
}
