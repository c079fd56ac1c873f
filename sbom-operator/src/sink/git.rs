//! Publishes SBOMs into a git repository.
//!
//! The repository is cloned once into the working directory and hard reset
//! to the remote branch at the start of every run. Each SBOM lands at
//! `<base>/<registry>/<repository>/<digest>/sbom.<ext>` and is committed and
//! pushed on its own; pruning happens in a single commit during cleanup.

use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use snafu::{ResultExt, ensure};
use tokio::process::Command;

use super::{Error, Sink, error};
use crate::{
    config::{GitConfig, SbomFormat},
    inventory::ContainerImage,
    scanner::Sbom,
};

const NAME: &str = "git";
/// File name, without extension, of every SBOM in the repository.
const SBOM_FILE_STEM: &str = "sbom";

/// Keeps one SBOM file per running image in a git repository.
pub struct GitTarget {
    working_tree: PathBuf,
    repository: String,
    branch: String,
    path: String,
    access_token: String,
    author_name: String,
    author_email: String,
    format: SbomFormat,
}

impl GitTarget {
    /// Creates the sink. Nothing touches the disk before `initialize`.
    pub fn new(config: &GitConfig, format: SbomFormat) -> Self {
        let GitConfig {
            working_tree,
            repository,
            branch,
            path,
            access_token,
            author_name,
            author_email,
        } = config.clone();
        Self {
            working_tree,
            repository,
            branch,
            path,
            access_token,
            author_name,
            author_email,
            format,
        }
    }

    /// `<working tree>/<path>/<image with '@' as '/' and ':' as '_'>/sbom.<ext>`
    fn sbom_path(&self, image_id: &str) -> PathBuf {
        let image_dir = image_id.replace('@', "/").replace(':', "_");
        self.working_tree
            .join(&self.path)
            .join(image_dir)
            .join(format!("{SBOM_FILE_STEM}.{}", self.format.file_extension()))
    }

    /// The repository URL with the access token embedded, for HTTPS remotes.
    fn remote_url(&self) -> String {
        match self.repository.strip_prefix("https://") {
            Some(rest) if !self.access_token.is_empty() => {
                format!("https://x-access-token:{}@{rest}", self.access_token)
            }
            _ => self.repository.clone(),
        }
    }

    /// Hides the access token in `message`.
    fn redact(&self, message: &str) -> String {
        if self.access_token.is_empty() {
            message.to_string()
        } else {
            message.replace(&self.access_token, "***")
        }
    }

    /// Runs `git <subcommand> <args>` inside the working tree.
    async fn git(&self, subcommand: &str, args: &[&str]) -> Result<String, Error> {
        self.run_git(Some(&self.working_tree), subcommand, args).await
    }

    /// Runs git with the configured identity and without prompting for
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be started or exits unsuccessfully. The
    /// error carries git's stderr with the token redacted.
    async fn run_git(
        &self,
        dir: Option<&Path>,
        subcommand: &str,
        args: &[&str],
    ) -> Result<String, Error> {
        let mut command = Command::new("git");
        let command = match dir {
            Some(dir) => command.current_dir(dir),
            None => &mut command,
        };
        let output = command
            .arg("-c")
            .arg(format!("user.name={}", self.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.author_email))
            .arg(subcommand)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context(error::SpawnGitSnafu)?;

        ensure!(
            output.status.success(),
            error::GitCommandSnafu {
                command: subcommand,
                status: output.status,
                stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
            }
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Commits whatever is staged and pushes it. A clean tree is left alone.
    async fn commit_and_push(&self, message: &str) -> Result<(), Error> {
        let status = self.git("status", &["--porcelain"]).await?;
        if status.trim().is_empty() {
            tracing::debug!("Nothing to commit in {}", self.working_tree.display());
            return Ok(());
        }

        let _stdout = self.git("commit", &["--message", message]).await?;
        let _stdout = self.git("push", &["origin", &self.branch]).await?;
        Ok(())
    }

    /// `path` relative to the working tree, for git pathspecs.
    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.working_tree).unwrap_or(path)
    }
}

impl Sink for GitTarget {
    fn name(&self) -> &str { NAME }

    fn validate_config(&self) -> Result<(), Error> {
        ensure!(
            !self.repository.is_empty(),
            error::MissingConfigSnafu { target: NAME, key: "git.repository" }
        );
        ensure!(
            !self.working_tree.as_os_str().is_empty(),
            error::MissingConfigSnafu { target: NAME, key: "git.workingTree" }
        );
        ensure!(
            !self.branch.is_empty(),
            error::MissingConfigSnafu { target: NAME, key: "git.branch" }
        );
        Ok(())
    }

    async fn initialize(&self) -> Result<(), Error> {
        let remote = self.remote_url();
        let exists = self.working_tree.join(".git").try_exists().unwrap_or(false);

        if exists {
            tracing::debug!("Refreshing working tree {}", self.working_tree.display());
            let _stdout = self.git("remote", &["set-url", "origin", &remote]).await?;
            let _stdout = self.git("fetch", &["origin", &self.branch]).await?;
            let _stdout =
                self.git("reset", &["--hard", &format!("origin/{}", self.branch)]).await?;
        } else {
            tracing::info!("Cloning {} into {}", self.repository, self.working_tree.display());
            tokio::fs::create_dir_all(&self.working_tree).await.with_context(|_| {
                error::CreateDirectorySnafu { path: self.working_tree.clone() }
            })?;
            let working_tree = self.working_tree.to_string_lossy();
            let _stdout = self
                .run_git(None, "clone", &[
                    "--branch",
                    &self.branch,
                    "--single-branch",
                    remote.as_str(),
                    working_tree.as_ref(),
                ])
                .await?;
        }

        Ok(())
    }

    async fn process_sbom(&self, image: &ContainerImage, sbom: &Sbom) -> Result<(), Error> {
        let path = self.sbom_path(&image.image_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|_| error::CreateDirectorySnafu { path: parent.to_path_buf() })?;
        }
        tokio::fs::write(&path, &sbom.content)
            .await
            .with_context(|_| error::WriteSbomSnafu { path: path.clone() })?;
        tracing::debug!("Wrote {} SBOM of {} to {}", sbom.format, image.image_id, path.display());

        let relative = self.relative(&path).to_string_lossy();
        let _stdout = self.git("add", &["--", relative.as_ref()]).await?;
        self.commit_and_push(&format!("Updated SBOM for {}", image.image_id)).await
    }

    async fn cleanup(&self, all_images: &[ContainerImage]) -> Result<(), Error> {
        let root = self.working_tree.join(&self.path);
        let keep =
            all_images.iter().map(|image| self.sbom_path(&image.image_id)).collect::<HashSet<_>>();

        let removed = {
            let prune_root = root.clone();
            tokio::task::spawn_blocking(move || prune_stale(&prune_root, &keep))
                .await
                .context(error::JoinPruneSnafu)?
                .with_context(|_| error::PruneSbomsSnafu { path: root.clone() })?
        };
        if removed.is_empty() {
            return Ok(());
        }

        tracing::info!("Removed {} SBOMs of images no longer running", removed.len());
        let relative = self.relative(&root).to_string_lossy();
        let pathspec = if relative.is_empty() { "." } else { relative.as_ref() };
        let _stdout = self.git("add", &["--all", "--", pathspec]).await?;
        self.commit_and_push("Deleted SBOMs of images no longer running").await
    }
}

/// Removes the SBOM files under `root` that are not in `keep`, leaving the
/// `.git` directory alone.
fn prune_stale(root: &Path, keep: &HashSet<PathBuf>) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !root.try_exists()? {
        return Ok(removed);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                if entry.file_name() != ".git" {
                    pending.push(path);
                }
                continue;
            }

            let is_sbom = path.file_stem().is_some_and(|stem| stem == SBOM_FILE_STEM);
            if is_sbom && !keep.contains(&path) {
                std::fs::remove_file(&path)?;
                removed.push(path);
            }
        }
    }

    Ok(removed)
}
