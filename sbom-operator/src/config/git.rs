use std::path::PathBuf;

use sbom_operator_base::consts;
use serde::{Deserialize, Serialize};

/// Settings of the git sink.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    /// Local checkout the operator owns. It is cloned on first use and reset
    /// to the remote branch on every run.
    #[serde(default = "GitConfig::default_working_tree")]
    pub working_tree: PathBuf,

    /// HTTPS URL of the repository.
    #[serde(default)]
    pub repository: String,

    /// Branch the SBOMs are committed to.
    #[serde(default = "GitConfig::default_branch")]
    pub branch: String,

    /// Directory inside the repository that receives the SBOMs.
    #[serde(default)]
    pub path: String,

    /// Token embedded into HTTPS remotes. Never logged.
    #[serde(default)]
    pub access_token: String,

    /// Author and committer name of the operator's commits.
    #[serde(default = "GitConfig::default_author_name")]
    pub author_name: String,

    /// Author and committer email of the operator's commits.
    #[serde(default = "GitConfig::default_author_email")]
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            working_tree: Self::default_working_tree(),
            repository: String::new(),
            branch: Self::default_branch(),
            path: String::new(),
            access_token: String::new(),
            author_name: Self::default_author_name(),
            author_email: Self::default_author_email(),
        }
    }
}

impl GitConfig {
    pub fn default_working_tree() -> PathBuf { PathBuf::from(consts::DEFAULT_GIT_WORKING_TREE) }

    pub fn default_branch() -> String { consts::DEFAULT_GIT_BRANCH.to_string() }

    pub fn default_author_name() -> String { consts::DEFAULT_GIT_AUTHOR_NAME.to_string() }

    pub fn default_author_email() -> String { consts::DEFAULT_GIT_AUTHOR_EMAIL.to_string() }
}
