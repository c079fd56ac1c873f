use std::{fmt, str::FromStr};

use snafu::Snafu;

/// Output format requested from the scanner.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SbomFormat {
    /// Syft's native JSON.
    #[default]
    Json,
    /// Syft's plain text listing.
    Text,
    /// CycloneDX XML.
    CycloneDx,
    /// CycloneDX JSON.
    CycloneDxJson,
    /// SPDX tag-value.
    Spdx,
    /// SPDX JSON.
    SpdxJson,
    /// Syft's table listing.
    Table,
    /// GitHub dependency snapshot JSON.
    GithubJson,
}

impl SbomFormat {
    /// Name of the format on the syft command line.
    pub const fn syft_output(self) -> &'static str {
        match self {
            Self::Json => "syft-json",
            Self::Text => "syft-text",
            Self::CycloneDx => "cyclonedx-xml",
            Self::CycloneDxJson => "cyclonedx-json",
            Self::Spdx => "spdx-tag-value",
            Self::SpdxJson => "spdx-json",
            Self::Table => "syft-table",
            Self::GithubJson => "github-json",
        }
    }

    /// Extension of the files the git sink writes.
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::Json | Self::CycloneDxJson | Self::SpdxJson | Self::GithubJson => "json",
            Self::Text | Self::Table => "txt",
            Self::CycloneDx => "xml",
            Self::Spdx => "spdx",
        }
    }

    /// Whether Dependency-Track accepts the format.
    pub const fn is_cyclonedx(self) -> bool {
        matches!(self, Self::CycloneDx | Self::CycloneDxJson)
    }
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::CycloneDx => "cyclonedx",
            Self::CycloneDxJson => "cyclonedx-json",
            Self::Spdx => "spdx",
            Self::SpdxJson => "spdx-json",
            Self::Table => "table",
            Self::GithubJson => "github-json",
        })
    }
}

impl FromStr for SbomFormat {
    type Err = ParseSbomFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "json" | "syft-json" => Ok(Self::Json),
            "text" | "syft-text" => Ok(Self::Text),
            "cyclonedx" | "cyclonedx-xml" => Ok(Self::CycloneDx),
            "cyclonedxjson" | "cyclonedx-json" => Ok(Self::CycloneDxJson),
            "spdx" | "spdx-tag-value" => Ok(Self::Spdx),
            "spdxjson" | "spdx-json" => Ok(Self::SpdxJson),
            "table" | "syft-table" => Ok(Self::Table),
            "github" | "githubjson" | "github-json" => Ok(Self::GithubJson),
            _ => Err(ParseSbomFormatError::Invalid { value: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseSbomFormatError {
    #[snafu(display("'{value}' is not a valid SBOM format"))]
    Invalid { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_short_and_syft_names() {
        assert_eq!("cyclonedxjson".parse::<SbomFormat>().unwrap(), SbomFormat::CycloneDxJson);
        assert_eq!("CycloneDX-JSON".parse::<SbomFormat>().unwrap(), SbomFormat::CycloneDxJson);
        assert_eq!("spdx-tag-value".parse::<SbomFormat>().unwrap(), SbomFormat::Spdx);
        assert_eq!("github".parse::<SbomFormat>().unwrap(), SbomFormat::GithubJson);
        assert!("yaml".parse::<SbomFormat>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for format in [
            SbomFormat::Json,
            SbomFormat::Text,
            SbomFormat::CycloneDx,
            SbomFormat::CycloneDxJson,
            SbomFormat::Spdx,
            SbomFormat::SpdxJson,
            SbomFormat::Table,
            SbomFormat::GithubJson,
        ] {
            assert_eq!(format.to_string().parse::<SbomFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(SbomFormat::CycloneDx.file_extension(), "xml");
        assert_eq!(SbomFormat::SpdxJson.file_extension(), "json");
        assert_eq!(SbomFormat::Table.file_extension(), "txt");
    }
}
