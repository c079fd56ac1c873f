//! Command line entry point of the operator.
//!
//! ```bash
//! # Run the operator with the configuration found in the default locations
//! sbom-operator run
//!
//! # Catalogue every image every ten minutes into a git repository
//! sbom-operator run --cron "0 */10 * * * *" --targets git \
//!     --git-repository https://github.com/org/sboms.git
//!
//! # Print the default configuration
//! sbom-operator default-config
//! ```

mod error;
mod run;

use std::{io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use sbom_operator_base::CLI_PROGRAM_NAME;
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::error::Error;
use self::run::RunCommand;
use crate::{config::Config, shadow};

/// `Cli` is the entry point of the SBOM Operator command line.
///
/// It parses the arguments and dispatches to the subcommand. Only `run` and
/// `version` without `--client` talk to the cluster.
#[derive(Parser)]
#[command(
    name = CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "SBOM Operator: catalogue the container images running in a Kubernetes cluster.",
    long_about = "SBOM Operator periodically inventories the container images running in a \
                  Kubernetes cluster, generates a Software Bill of Materials for every image \
                  and forwards it to a git repository or a Dependency-Track server. Processed \
                  pods are annotated so that unchanged images are not scanned again.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    /// The subcommand to execute.
    #[clap(subcommand)]
    commands: Option<Commands>,

    /// Path to the configuration file.
    ///
    /// Without it, `~/.config/sbom-operator/config.yaml` and
    /// `/etc/sbom-operator/config.yaml` are tried, then the built-in defaults
    /// are used.
    #[clap(
        long = "config",
        short = 'c',
        env = "SBOM_OPERATOR_CONFIG_FILE_PATH",
        help = "Specify a configuration file. Defaults to ~/.config/sbom-operator/config.yaml or \
                SBOM_OPERATOR_CONFIG_FILE_PATH env var."
    )]
    config_file: Option<PathBuf>,

    /// Overrides the log level of the configuration file.
    #[clap(
        long = "log-level",
        env = "SBOM_VERBOSITY",
        help = "Set the logging level (e.g., info, debug, trace)."
    )]
    log_level: Option<tracing::Level>,
}

/// `Commands` enumerates the subcommands of the operator.
#[allow(variant_size_differences)]
#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Displays client and server version information.
    #[command(about = "Display client and server version information")]
    Version {
        /// Only print the client version, without contacting the API server.
        #[clap(long = "client", help = "If true, shows client version only (no server required).")]
        client: bool,
    },

    /// Generates a shell completion script for the specified shell.
    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    /// Outputs the default configuration in YAML format.
    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,

    /// Runs the operator: one catalogue run per cron tick until SIGINT or
    /// SIGTERM.
    #[command(about = "Run the operator until it receives SIGINT or SIGTERM")]
    Run(Box<RunCommand>),
}

impl Default for Cli {
    /// Parses the process arguments.
    fn default() -> Self { Self::parse() }
}

impl Cli {
    /// Loads the configuration file, if any, and applies the global overrides.
    ///
    /// An explicitly given file has to exist. Without one, the default
    /// locations are searched and the built-in defaults are used when none of
    /// them holds a file.
    fn load_config(&self) -> Result<Config, Error> {
        let path = self.config_file.clone().or_else(Config::search_config_file_path);
        let mut config = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }

        Ok(config)
    }

    /// Executes the parsed command and returns the process exit code.
    ///
    /// Commands that need neither configuration nor cluster are answered
    /// right away. Otherwise the configuration is loaded, logging is set up
    /// and the command runs on a multi-threaded Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the Kubernetes
    /// client cannot be created, or the operator stops on a fatal error.
    pub fn run(self) -> Result<i32, Error> {
        let client_version = Self::command().get_version().unwrap_or_default().to_string();
        match self.commands {
            Some(Commands::Version { client }) if client => {
                write_stdout(Self::command().render_long_version().as_bytes())?;
                write_stdout(format!("Client Version: {client_version}\n").as_bytes())?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut std::io::stdout());
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                write_stdout(Config::template()?.as_bytes())?;
                return Ok(0);
            }
            None => {
                let help = Self::command().render_long_help().ansi().to_string();
                std::io::stderr().write_all(help.as_bytes()).context(error::WriteStdoutSnafu)?;
                return Ok(-1);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let fut = async move {
            let kube_client = kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
            match self.commands {
                Some(Commands::Version { .. }) => {
                    let server_version = kube_client.apiserver_version().await.map_or_else(
                        |_| "unknown".to_string(),
                        |info| format!("{}.{}", info.major, info.minor),
                    );
                    write_stdout(Self::command().render_long_version().as_bytes())?;
                    write_stdout(
                        format!(
                            "Client Version: {client_version}\nServer Version: {server_version}\n"
                        )
                        .as_bytes(),
                    )?;
                }
                Some(Commands::Run(cmd)) => (*cmd).run(kube_client, config).await?,
                _ => {}
            }

            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}

/// Writes `bytes` to standard output.
fn write_stdout(bytes: &[u8]) -> Result<(), Error> {
    std::io::stdout().write_all(bytes).context(error::WriteStdoutSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() { Cli::command().debug_assert(); }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "sbom-operator",
            "--config",
            "/etc/sbom-operator/config.yaml",
            "--log-level",
            "debug",
            "default-config",
        ])
        .unwrap();

        assert_eq!(cli.config_file, Some(PathBuf::from("/etc/sbom-operator/config.yaml")));
        assert_eq!(cli.log_level, Some(tracing::Level::DEBUG));
        assert!(matches!(cli.commands, Some(Commands::DefaultConfig)));
    }
}
