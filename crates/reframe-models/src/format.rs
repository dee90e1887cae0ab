//! Target aspect ratio definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported target aspect ratios for the conversion tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetFormat {
    /// Square, e.g. feed posts
    #[serde(rename = "1:1")]
    Square,
    /// Classic landscape
    #[serde(rename = "16:9")]
    Landscape,
    /// Vertical, e.g. stories and shorts
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
}

/// Error returned when parsing an unknown aspect ratio string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported target format: {0}")]
pub struct FormatParseError(pub String);

impl TargetFormat {
    /// Ratio string as passed to the conversion tool, e.g. `9:16`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Square => "1:1",
            TargetFormat::Landscape => "16:9",
            TargetFormat::Portrait => "9:16",
        }
    }

    /// Ratio with the colon flattened for use in filenames, e.g. `9_16`.
    pub fn as_filename_part(&self) -> &'static str {
        match self {
            TargetFormat::Square => "1_1",
            TargetFormat::Landscape => "16_9",
            TargetFormat::Portrait => "9_16",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1:1" => Ok(TargetFormat::Square),
            "16:9" => Ok(TargetFormat::Landscape),
            "9:16" => Ok(TargetFormat::Portrait),
            other => Err(FormatParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for fmt in [TargetFormat::Square, TargetFormat::Landscape, TargetFormat::Portrait] {
            assert_eq!(fmt.as_str().parse::<TargetFormat>().unwrap(), fmt);
        }
        assert!("4:3".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn serde_uses_ratio_strings() {
        let json = serde_json::to_string(&TargetFormat::Portrait).unwrap();
        assert_eq!(json, "\"9:16\"");
        let back: TargetFormat = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, TargetFormat::Landscape);
    }

    #[test]
    fn filename_part_has_no_colon() {
        assert_eq!(TargetFormat::Portrait.as_filename_part(), "9_16");
        assert_eq!(TargetFormat::Square.as_filename_part(), "1_1");
    }
}
