use std::{fmt, str::FromStr};

use snafu::Snafu;

/// A sink selectable by name in the configuration.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TargetKind {
    /// `git`
    Git,
    /// `dtrack`
    DependencyTrack,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Git => "git",
            Self::DependencyTrack => "dtrack",
        })
    }
}

impl FromStr for TargetKind {
    type Err = ParseTargetKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "dtrack" | "dependency-track" => Ok(Self::DependencyTrack),
            _ => Err(ParseTargetKindError::Unknown { value: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseTargetKindError {
    #[snafu(display("Unknown target '{value}', expected 'git' or 'dtrack'"))]
    Unknown { value: String },
}
