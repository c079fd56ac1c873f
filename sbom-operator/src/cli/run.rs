use std::{path::PathBuf, time::Duration};

use clap::Args;
use sbom_operator_base::consts::k8s::env::POD_NAMESPACE;

use crate::{
    cli::Error,
    cluster::KubeCluster,
    config::{Config, SbomFormat, TargetKind},
    daemon::{Execution, Orchestrator},
    inventory::Discovery,
    job::{JobController, JobSettings, forwarded_envs, utf8_vars},
    registry::PullSecretResolver,
    scanner::SyftScanner,
    sink::Target,
};

/// Settings of the configuration file that can be overridden from the command
/// line or the environment.
#[derive(Args, Clone, Debug, Default)]
pub struct RunCommand {
    /// Overrides `cron`.
    #[arg(long = "cron", env = "SBOM_CRON", help = "Cron expression of the runs, seconds first.")]
    pub cron: Option<String>,

    /// Overrides `format`.
    #[arg(
        long = "format",
        env = "SBOM_FORMAT",
        help = "SBOM format (e.g., json, cyclonedx, spdxjson)."
    )]
    pub format: Option<SbomFormat>,

    /// Overrides `targets`, in dispatch order.
    #[arg(
        long = "targets",
        env = "SBOM_TARGETS",
        value_delimiter = ',',
        help = "Comma separated list of targets receiving the SBOMs (git, dtrack)."
    )]
    pub targets: Option<Vec<TargetKind>>,

    /// Sets `ignoreAnnotations`. It cannot be unset from the command line.
    #[arg(
        long = "ignore-annotations",
        env = "SBOM_IGNORE_ANNOTATIONS",
        help = "Scan every image on every run, regardless of the processed annotations."
    )]
    pub ignore_annotations: bool,

    /// Label selector of the namespaces to inventory.
    #[arg(long = "namespace-label-selector", env = "SBOM_NAMESPACE_LABEL_SELECTOR")]
    pub namespace_label_selector: Option<String>,

    /// Label selector of the pods to inventory.
    #[arg(long = "pod-label-selector", env = "SBOM_POD_LABEL_SELECTOR")]
    pub pod_label_selector: Option<String>,

    /// Overrides `kubernetesClusterId`.
    #[arg(
        long = "kubernetes-cluster-id",
        env = "SBOM_KUBERNETES_CLUSTER_ID",
        help = "Identifier of the cluster recorded with every pod."
    )]
    pub kubernetes_cluster_id: Option<String>,

    /// Overrides `scanner.syftPath`.
    #[arg(long = "syft-path", env = "SBOM_SYFT_PATH", help = "Path of the syft executable.")]
    pub syft_path: Option<PathBuf>,

    /// Overrides `job.image`.
    #[arg(
        long = "job-image",
        env = "SBOM_JOB_IMAGE",
        help = "Image of the scan job. Setting it delegates scanning to a batch job."
    )]
    pub job_image: Option<String>,

    /// Pull secret of the scan job image.
    #[arg(long = "job-image-pull-secret", env = "SBOM_JOB_IMAGE_PULL_SECRET")]
    pub job_image_pull_secret: Option<String>,

    /// Overrides `job.timeoutSecs`.
    #[arg(
        long = "job-timeout",
        env = "SBOM_JOB_TIMEOUT",
        help = "Deadline of the scan job, in seconds."
    )]
    pub job_timeout_secs: Option<u64>,

    /// Namespace of the scan jobs. Defaults to the operator's namespace.
    #[arg(long = "job-namespace", env = "SBOM_JOB_NAMESPACE")]
    pub job_namespace: Option<String>,

    /// Local checkout of the SBOM repository.
    #[arg(long = "git-workingtree", env = "SBOM_GIT_WORKINGTREE")]
    pub git_working_tree: Option<PathBuf>,

    /// HTTPS URL of the SBOM repository.
    #[arg(long = "git-repository", env = "SBOM_GIT_REPOSITORY")]
    pub git_repository: Option<String>,

    /// Branch receiving the SBOM commits.
    #[arg(long = "git-branch", env = "SBOM_GIT_BRANCH")]
    pub git_branch: Option<String>,

    /// Directory inside the repository receiving the SBOMs.
    #[arg(long = "git-path", env = "SBOM_GIT_PATH")]
    pub git_path: Option<String>,

    /// Access token for the SBOM repository.
    #[arg(long = "git-access-token", env = "SBOM_GIT_ACCESS_TOKEN", hide_env_values = true)]
    pub git_access_token: Option<String>,

    /// Author name of the SBOM commits.
    #[arg(long = "git-author-name", env = "SBOM_GIT_AUTHOR_NAME")]
    pub git_author_name: Option<String>,

    /// Author email of the SBOM commits.
    #[arg(long = "git-author-email", env = "SBOM_GIT_AUTHOR_EMAIL")]
    pub git_author_email: Option<String>,

    /// Base URL of the Dependency-Track server.
    #[arg(long = "dtrack-base-url", env = "SBOM_DTRACK_BASE_URL")]
    pub dtrack_base_url: Option<String>,

    /// API key for the Dependency-Track server.
    #[arg(long = "dtrack-api-key", env = "SBOM_DTRACK_API_KEY", hide_env_values = true)]
    pub dtrack_api_key: Option<String>,
}

macro_rules! override_with {
    ($($target:expr => $value:expr),+ $(,)?) => {
        $(
            if let Some(value) = $value {
                $target = value;
            }
        )+
    };
}

impl RunCommand {
    /// Replaces the settings of `config` given on the command line or in the
    /// environment.
    fn apply(self, config: &mut Config) {
        let Self {
            cron,
            format,
            targets,
            ignore_annotations,
            namespace_label_selector,
            pod_label_selector,
            kubernetes_cluster_id,
            syft_path,
            job_image,
            job_image_pull_secret,
            job_timeout_secs,
            job_namespace,
            git_working_tree,
            git_repository,
            git_branch,
            git_path,
            git_access_token,
            git_author_name,
            git_author_email,
            dtrack_base_url,
            dtrack_api_key,
        } = self;

        override_with! {
            config.cron => cron,
            config.format => format,
            config.targets => targets,
            config.namespace_label_selector => namespace_label_selector,
            config.pod_label_selector => pod_label_selector,
            config.kubernetes_cluster_id => kubernetes_cluster_id,
            config.scanner.syft_path => syft_path,
            config.job.image => job_image,
            config.job.timeout_secs => job_timeout_secs,
            config.git.working_tree => git_working_tree,
            config.git.repository => git_repository,
            config.git.branch => git_branch,
            config.git.path => git_path,
            config.git.access_token => git_access_token,
            config.git.author_name => git_author_name,
            config.git.author_email => git_author_email,
            config.dtrack.base_url => dtrack_base_url,
            config.dtrack.api_key => dtrack_api_key,
        }
        config.ignore_annotations |= ignore_annotations;
        if job_image_pull_secret.is_some() {
            config.job.image_pull_secret = job_image_pull_secret;
        }
        if job_namespace.is_some() {
            config.job.namespace = job_namespace;
        }
    }

    /// Starts the operator and blocks until it shuts down.
    ///
    /// Builds the delegated execution when a job image is configured, otherwise
    /// the scanner and the sinks in configuration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a sink cannot be built,
    /// or the orchestrator stops on a fatal error.
    pub async fn run(self, kube_client: kube::Client, mut config: Config) -> Result<(), Error> {
        self.apply(&mut config);
        config.validate()?;

        let cluster = KubeCluster::from(kube_client);
        let resolver = PullSecretResolver::new(cluster.clone());

        let execution = if config.job.is_enabled() {
            let namespace = config
                .job
                .namespace
                .clone()
                .filter(|namespace| !namespace.is_empty())
                .or_else(|| {
                    std::env::var(POD_NAMESPACE).ok().filter(|namespace| !namespace.is_empty())
                })
                .unwrap_or_else(|| cluster.default_namespace().to_string());
            let settings = JobSettings {
                image_pull_secret: config.job.image_pull_secret.clone(),
                timeout: Duration::from_secs(config.job.timeout_secs),
                env: forwarded_envs(utf8_vars(std::env::vars_os())),
                ..JobSettings::new(config.job.image.clone(), namespace)
            };
            tracing::info!(
                "Scans are delegated to jobs running {} in namespace {}",
                settings.image,
                settings.namespace
            );
            Execution::Delegated(JobController::new(resolver, settings))
        } else {
            let sinks = config
                .targets
                .iter()
                .map(|kind| Target::from_kind(*kind, &config))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::info!(
                "Scanning in-process with {}, targets: {:?}",
                config.scanner.syft_path.display(),
                config.targets.iter().map(ToString::to_string).collect::<Vec<_>>()
            );
            let scanner =
                SyftScanner::new(config.scanner.syft_path.clone(), config.format, resolver);
            Execution::InProcess { scanner, sinks }
        };

        let orchestrator = Orchestrator::new(cluster, Discovery::from(&config), execution);
        orchestrator.start(&config.cron, shutdown_signal()).await?;

        tracing::info!("{} stopped", sbom_operator_base::PROJECT_NAME_WITH_INITIAL_CAPITAL);
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for SIGINT, error: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _signal = signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("Failed to listen for SIGTERM, error: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
