//! In-process SBOM generation.

mod error;
mod syft;

pub use self::{error::Error, syft::SyftScanner};
use crate::{config::SbomFormat, inventory::ContainerImage};

/// An SBOM for one image, as emitted by the scanner.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sbom {
    /// Format the scanner was asked for.
    pub format: SbomFormat,
    /// The document exactly as the scanner wrote it.
    pub content: Vec<u8>,
}

/// Turns one image into one SBOM.
pub trait Scanner {
    /// Generates the SBOM of `image`, pulling it from its registry.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be resolved, the scanner cannot be
    /// started or it exits unsuccessfully.
    async fn scan(&self, image: &ContainerImage) -> Result<Sbom, Error>;
}
