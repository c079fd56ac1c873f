pub mod k8s {
    pub mod labels {
        pub const NAME: &str = "app.kubernetes.io/name";
        pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
        pub const COMPONENT: &str = "app.kubernetes.io/component";
    }

    pub mod annotations {
        use std::sync::LazyLock;

        use crate::PROJECT_NAME;

        /// Prefix of the per-container "processed" annotation. The full key is
        /// `<prefix>/<container-name>` and the value is the image id that was
        /// catalogued for that container.
        pub static PROCESSED_PREFIX: LazyLock<String> =
            LazyLock::new(|| format!("{PROJECT_NAME}.io"));

        #[must_use]
        pub fn processed_key(container_name: &str) -> String {
            format!("{}/{container_name}", *PROCESSED_PREFIX)
        }
    }

    pub mod env {
        /// Namespace the operator pod runs in, injected through the downward
        /// API.
        pub const POD_NAMESPACE: &str = "POD_NAMESPACE";
    }
}

/// Default cron expression, seconds first.
pub const DEFAULT_CRON: &str = "0 30 * * * *";
pub const DEFAULT_CLUSTER_ID: &str = "default";
pub const DEFAULT_SYFT_PATH: &str = "syft";
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 60 * 60;
pub const DEFAULT_GIT_BRANCH: &str = "main";
pub const DEFAULT_GIT_WORKING_TREE: &str = "/work";
pub const DEFAULT_GIT_AUTHOR_NAME: &str = "sbom-operator";
pub const DEFAULT_GIT_AUTHOR_EMAIL: &str = "sbom-operator@users.noreply.github.com";
