//! The weighted quality rubric.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the eight rubric metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityMetric {
    Functionality,
    CodeQuality,
    Architecture,
    Accessibility,
    Performance,
    VisualImplementation,
    ErrorHandling,
    TokenEfficiency,
}

impl QualityMetric {
    /// All metrics in rubric order.
    pub const ALL: [QualityMetric; 8] = [
        Self::Functionality,
        Self::CodeQuality,
        Self::Architecture,
        Self::Accessibility,
        Self::Performance,
        Self::VisualImplementation,
        Self::ErrorHandling,
        Self::TokenEfficiency,
    ];

    /// Weight in the overall score. Weights sum to 1.0.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            Self::Functionality => 0.20,
            Self::CodeQuality | Self::ErrorHandling => 0.15,
            Self::Architecture
            | Self::Accessibility
            | Self::Performance
            | Self::VisualImplementation
            | Self::TokenEfficiency => 0.10,
        }
    }

    /// camelCase key used on the wire.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Functionality => "functionality",
            Self::CodeQuality => "codeQuality",
            Self::Architecture => "architecture",
            Self::Accessibility => "accessibility",
            Self::Performance => "performance",
            Self::VisualImplementation => "visualImplementation",
            Self::ErrorHandling => "errorHandling",
            Self::TokenEfficiency => "tokenEfficiency",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Functionality => "Functionality",
            Self::CodeQuality => "Code quality",
            Self::Architecture => "Architecture",
            Self::Accessibility => "Accessibility",
            Self::Performance => "Performance",
            Self::VisualImplementation => "Visual implementation",
            Self::ErrorHandling => "Error handling",
            Self::TokenEfficiency => "Token efficiency",
        }
    }

    /// Suggestion used when a metric has no recorded weakness.
    #[must_use]
    pub fn fallback_suggestion(&self) -> &'static str {
        match self {
            Self::Functionality => "Cover every requirement in the task description and export a usable entry point",
            Self::CodeQuality => "Add explicit types and short comments, and keep functions small",
            Self::Architecture => "Split the implementation into focused, reusable units with typed interfaces",
            Self::Accessibility => "Add ARIA attributes, labels and keyboard support to interactive elements",
            Self::Performance => "Memoize derived values and avoid repeated work inside render paths and loops",
            Self::VisualImplementation => "Use consistent styling classes and responsive breakpoints",
            Self::ErrorHandling => "Validate inputs and surface failures instead of letting them escape",
            Self::TokenEfficiency => "Remove duplicated code and boilerplate to keep the implementation compact",
        }
    }

    /// Look up a metric by its key (case-insensitive).
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = QualityMetric::ALL.iter().map(QualityMetric::weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_roundtrip() {
        for metric in QualityMetric::ALL {
            assert_eq!(QualityMetric::from_key(metric.key()), Some(metric));
            assert_eq!(
                serde_json::to_value(metric).unwrap(),
                serde_json::Value::String(metric.key().to_string())
            );
        }
        assert_eq!(QualityMetric::from_key("bogus"), None);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(7.26), 7.3);
        assert_eq!(round1(0.0), 0.0);
        assert_eq!(round1(8.44), 8.4);
    }
}
