use serde::{Deserialize, Serialize};

/// Settings of the Dependency-Track sink.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTrackConfig {
    /// Server URL without the `/api` suffix, e.g. `https://dtrack.example.com`.
    #[serde(default)]
    pub base_url: String,

    /// API key of a team allowed to upload BOMs and create projects.
    #[serde(default)]
    pub api_key: String,
}
