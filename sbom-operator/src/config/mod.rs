mod dependency_track;
mod error;
mod git;
mod job;
mod sbom_format;
mod target_kind;

use std::path::{Path, PathBuf};

use resolve_path::PathResolveExt;
use sbom_operator_base::consts;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use snafu::{ResultExt, ensure};

pub use self::{
    dependency_track::DependencyTrackConfig, error::Error, git::GitConfig, job::JobConfig,
    sbom_format::SbomFormat, target_kind::TargetKind,
};

/// Operator configuration, read from YAML and overridden from the command
/// line.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Logging setup.
    #[serde(default = "sbom_operator_cli::config::LogConfig::default")]
    pub log: sbom_operator_cli::config::LogConfig,

    /// Six field cron expression, seconds first.
    #[serde(default = "Config::default_cron")]
    pub cron: String,

    /// Format of the generated SBOMs.
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub format: SbomFormat,

    /// Sinks in dispatch order.
    #[serde(default)]
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub targets: Vec<TargetKind>,

    /// Rescan every image on every run, regardless of the processed
    /// annotations.
    #[serde(default)]
    pub ignore_annotations: bool,

    /// Label selector of the inventoried namespaces. Empty selects all.
    #[serde(default)]
    pub namespace_label_selector: String,

    /// Label selector of the inventoried pods. Empty selects all.
    #[serde(default)]
    pub pod_label_selector: String,

    /// Identifier of this cluster, recorded with every pod in the job payload.
    #[serde(default = "Config::default_kubernetes_cluster_id")]
    pub kubernetes_cluster_id: String,

    /// In-process scanner.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Delegated execution.
    #[serde(default)]
    pub job: JobConfig,

    /// Git sink.
    #[serde(default)]
    pub git: GitConfig,

    /// Dependency-Track sink.
    #[serde(default)]
    pub dtrack: DependencyTrackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: sbom_operator_cli::config::LogConfig::default(),
            cron: Self::default_cron(),
            format: SbomFormat::default(),
            targets: vec![TargetKind::Git],
            ignore_annotations: false,
            namespace_label_selector: String::new(),
            pod_label_selector: String::new(),
            kubernetes_cluster_id: Self::default_kubernetes_cluster_id(),
            scanner: ScannerConfig::default(),
            job: JobConfig::default(),
            git: GitConfig::default(),
            dtrack: DependencyTrackConfig::default(),
        }
    }
}

impl Config {
    /// Every hour at minute 30.
    pub fn default_cron() -> String { consts::DEFAULT_CRON.to_string() }

    /// `default`
    pub fn default_kubernetes_cluster_id() -> String { consts::DEFAULT_CLUSTER_ID.to_string() }

    /// The first existing configuration file among the default locations.
    pub fn search_config_file_path() -> Option<PathBuf> {
        std::iter::once(Self::default_path())
            .chain(sbom_operator_base::fallback_project_config_directories().into_iter().map(
                |mut path| {
                    path.push(sbom_operator_base::CLI_CONFIG_NAME);
                    path
                },
            ))
            .find(|path| path.try_exists().unwrap_or(false))
    }

    /// `config.yaml` in the project configuration directory.
    #[inline]
    pub fn default_path() -> PathBuf {
        [
            sbom_operator_base::PROJECT_CONFIG_DIR.to_path_buf(),
            PathBuf::from(sbom_operator_base::CLI_CONFIG_NAME),
        ]
        .into_iter()
        .collect()
    }

    /// Reads the configuration file at `path`.
    ///
    /// Relative paths, in the argument and in the log file setting, are resolved
    /// against the current directory and `~` is expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML, or if a
    /// path cannot be resolved.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut config: Self = {
            let path =
                path.as_ref().try_resolve().map(|path| path.to_path_buf()).with_context(|_| {
                    error::ResolveFilePathSnafu { file_path: path.as_ref().to_path_buf() }
                })?;
            let data =
                std::fs::read(&path).context(error::OpenConfigSnafu { filename: path.clone() })?;
            serde_yaml::from_slice(&data).context(error::ParseConfigSnafu { filename: path })?
        };

        config.log.file_path = config
            .log
            .file_path
            .map(|path| {
                path.try_resolve()
                    .map(|path| path.to_path_buf())
                    .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
            })
            .transpose()?;

        Ok(config)
    }

    /// The default configuration rendered as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn template() -> Result<String, Error> {
        serde_yaml::to_string(&Self::default()).context(error::SerializeConfigSnafu)
    }

    /// Checks the settings that cannot be told apart from defaults while
    /// parsing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTargets`] when in-process execution has no sink to
    /// feed.
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(self.job.is_enabled() || !self.targets.is_empty(), error::NoTargetsSnafu);
        Ok(())
    }
}

/// Settings of the in-process scanner.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfig {
    /// Path of the syft executable, looked up in `PATH` when relative.
    #[serde(default = "ScannerConfig::default_syft_path")]
    pub syft_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self { Self { syft_path: Self::default_syft_path() } }
}

impl ScannerConfig {
    /// `syft`
    pub fn default_syft_path() -> PathBuf { PathBuf::from(consts::DEFAULT_SYFT_PATH) }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: Config = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.cron, "0 30 * * * *");
        assert_eq!(config.format, SbomFormat::Json);
        assert!(config.targets.is_empty());
        assert_eq!(config.kubernetes_cluster_id, "default");
        assert_eq!(config.scanner.syft_path, PathBuf::from("syft"));
        assert_eq!(config.job.timeout_secs, 3600);
        assert!(!config.job.is_enabled());
        assert_eq!(config.git.branch, "main");
    }

    #[test]
    fn test_parse_document() {
        let yaml = r#"
cron: "0 0 * * * *"
format: cyclonedxjson
targets: [git, dtrack]
ignoreAnnotations: true
podLabelSelector: app=web
kubernetesClusterId: production
job:
  image: ghcr.io/org/sbom-job:1.0
  timeoutSecs: 600
git:
  repository: https://github.com/org/sboms.git
  path: clusters/production
dtrack:
  baseUrl: https://dtrack.example.com
  apiKey: secret
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.format, SbomFormat::CycloneDxJson);
        assert_eq!(config.targets, vec![TargetKind::Git, TargetKind::DependencyTrack]);
        assert!(config.ignore_annotations);
        assert_eq!(config.pod_label_selector, "app=web");
        assert!(config.job.is_enabled());
        assert_eq!(config.job.timeout_secs, 600);
        assert_eq!(config.git.path, "clusters/production");
        assert_eq!(config.git.working_tree, PathBuf::from("/work"));
        assert_eq!(config.dtrack.api_key, "secret");
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        assert!(serde_yaml::from_str::<Config>("targets: [s3]").is_err());
    }

    #[test]
    fn test_validate_requires_targets_in_process() {
        let config = Config { targets: Vec::new(), ..Config::default() };
        assert!(matches!(config.validate(), Err(Error::NoTargets)));

        let mut delegated = config;
        delegated.job.image = "ghcr.io/org/sbom-job:1.0".to_string();
        assert!(delegated.validate().is_ok());
    }

    #[test]
    fn test_template_parses_back() {
        let config: Config = serde_yaml::from_str(&Config::template().unwrap()).unwrap();

        assert_eq!(config.targets, vec![TargetKind::Git]);
        assert_eq!(config.cron, Config::default_cron());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cron: \"*/5 * * * * *\"\ntargets: [dtrack]").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.cron, "*/5 * * * * *");
        assert_eq!(config.targets, vec![TargetKind::DependencyTrack]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = Config::load(dir.path().join("missing.yaml"));

        assert!(matches!(result, Err(Error::OpenConfig { .. })));
    }
}
