//! Destinations of generated SBOMs.
//!
//! Every run re-initializes the configured sinks, feeds them one SBOM per
//! image and finally lets them drop whatever belongs to images that are no
//! longer running.

mod dependency_track;
mod error;
mod git;

pub use self::{dependency_track::DependencyTrackTarget, error::Error, git::GitTarget};
use crate::{
    config::{Config, TargetKind},
    inventory::ContainerImage,
    scanner::Sbom,
};

/// A destination of generated SBOMs.
///
/// A sink lives for the whole process but only carries state across a single
/// run: `initialize` is called once per run before any SBOM, then
/// `process_sbom` once per catalogued image, then `cleanup` once.
pub trait Sink {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Checks the settings without touching any remote system.
    fn validate_config(&self) -> Result<(), Error>;

    /// Prepares the sink for a run.
    ///
    /// # Errors
    ///
    /// A failure here aborts the run before any image is scanned.
    async fn initialize(&self) -> Result<(), Error>;

    /// Stores the SBOM of `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SBOM could not be stored. The image then stays
    /// pending and is scanned again on the next run.
    async fn process_sbom(&self, image: &ContainerImage, sbom: &Sbom) -> Result<(), Error>;

    /// Called once per run with every image currently running.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller and never abort the run.
    async fn cleanup(&self, all_images: &[ContainerImage]) -> Result<(), Error>;
}

/// The sinks selectable from the configuration.
pub enum Target {
    /// Commits SBOM files to a git repository.
    Git(GitTarget),
    /// Uploads SBOMs to a Dependency-Track server.
    DependencyTrack(DependencyTrackTarget),
}

impl Target {
    /// Builds the sink of `kind` from its section of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink's client cannot be constructed. Missing
    /// settings are reported later by [`Sink::validate_config`].
    pub fn from_kind(kind: TargetKind, config: &Config) -> Result<Self, Error> {
        match kind {
            TargetKind::Git => Ok(Self::Git(GitTarget::new(&config.git, config.format))),
            TargetKind::DependencyTrack => {
                DependencyTrackTarget::new(&config.dtrack, config.format).map(Self::DependencyTrack)
            }
        }
    }
}

impl Sink for Target {
    fn name(&self) -> &str {
        match self {
            Self::Git(target) => target.name(),
            Self::DependencyTrack(target) => target.name(),
        }
    }

    fn validate_config(&self) -> Result<(), Error> {
        match self {
            Self::Git(target) => target.validate_config(),
            Self::DependencyTrack(target) => target.validate_config(),
        }
    }

    async fn initialize(&self) -> Result<(), Error> {
        match self {
            Self::Git(target) => target.initialize().await,
            Self::DependencyTrack(target) => target.initialize().await,
        }
    }

    async fn process_sbom(&self, image: &ContainerImage, sbom: &Sbom) -> Result<(), Error> {
        match self {
            Self::Git(target) => target.process_sbom(image, sbom).await,
            Self::DependencyTrack(target) => target.process_sbom(image, sbom).await,
        }
    }

    async fn cleanup(&self, all_images: &[ContainerImage]) -> Result<(), Error> {
        match self {
            Self::Git(target) => target.cleanup(all_images).await,
            Self::DependencyTrack(target) => target.cleanup(all_images).await,
        }
    }
}
