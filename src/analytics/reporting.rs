//! Report output formats.

use crate::error::{ConductorError, Result};
use std::str::FromStr;

/// Output format for generated reports.
///
/// # Example
///
/// ```
/// use conductor::analytics::ReportFormat;
///
/// assert_eq!(ReportFormat::Json.extension(), "json");
/// assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// JSON format.
    Json,
    /// Markdown format.
    #[default]
    Markdown,
}

impl ReportFormat {
    /// Get the file extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(ConductorError::validation(
                "format",
                format!("unknown report format '{}' (expected json or markdown)", other),
            )),
        }
    }
}

/// Render a ratio in `[0, 1]` as a percentage with one decimal.
#[must_use]
pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("markdown".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("html".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.9), "90.0%");
        assert_eq!(percent(0.0), "0.0%");
    }
}
