//! Trend analysis over completed task history.
//!
//! Trends compare the mean of the first third of a series with the mean of
//! the last third. Fewer than [`MIN_TREND_SAMPLES`] samples yield
//! [`EfficiencyTrend::InsufficientData`].

use super::tokens::TokenUsageRecord;
use serde::{Deserialize, Serialize};

/// Minimum completed tasks for a meaningful trend.
pub const MIN_TREND_SAMPLES: usize = 3;

/// Change in efficiency gain (percentage points) treated as significant.
pub const GAIN_THRESHOLD: f64 = 5.0;

/// Change in quality score (points) treated as significant.
pub const QUALITY_THRESHOLD: f64 = 0.5;

/// Direction of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Later values are higher.
    Improving,
    /// No significant change.
    Stable,
    /// Later values are lower.
    Degrading,
}

impl TrendDirection {
    fn from_change(change: f64, threshold: f64) -> Self {
        if change > threshold {
            Self::Improving
        } else if change < -threshold {
            Self::Degrading
        } else {
            Self::Stable
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Stable => write!(f, "stable"),
            Self::Degrading => write!(f, "degrading"),
        }
    }
}

/// First-third versus last-third comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EfficiencyTrend {
    /// Not enough samples.
    #[serde(rename_all = "camelCase")]
    InsufficientData { completed: usize },
    /// A computed trend.
    #[serde(rename_all = "camelCase")]
    Trend {
        direction: TrendDirection,
        early_mean: f64,
        recent_mean: f64,
        change: f64,
        samples: usize,
    },
}

impl EfficiencyTrend {
    /// Direction, if enough data was available.
    #[must_use]
    pub fn direction(&self) -> Option<TrendDirection> {
        match self {
            Self::InsufficientData { .. } => None,
            Self::Trend { direction, .. } => Some(*direction),
        }
    }
}

/// Trend of a series, oldest value first.
#[must_use]
pub fn series_trend(values: &[f64], threshold: f64) -> EfficiencyTrend {
    if values.len() < MIN_TREND_SAMPLES {
        return EfficiencyTrend::InsufficientData {
            completed: values.len(),
        };
    }

    let third = values.len() / 3;
    let mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len() as f64;
    let early_mean = mean(&values[..third]);
    let recent_mean = mean(&values[values.len() - third..]);
    let change = recent_mean - early_mean;

    EfficiencyTrend::Trend {
        direction: TrendDirection::from_change(change, threshold),
        early_mean,
        recent_mean,
        change,
        samples: values.len(),
    }
}

/// Efficiency-gain trend over completed records, ordered by completion time.
///
/// Records without a defined efficiency (no direct estimate or no delegated
/// cost) are left out of the series.
#[must_use]
pub fn analyze_efficiency_trend(records: &[&TokenUsageRecord]) -> EfficiencyTrend {
    let mut ordered: Vec<&TokenUsageRecord> = records
        .iter()
        .copied()
        .filter(|r| r.efficiency().is_defined())
        .collect();
    ordered.sort_by_key(|r| r.completed_at);
    let gains: Vec<f64> = ordered.iter().map(|r| r.efficiency().efficiency_gain).collect();
    series_trend(&gains, GAIN_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_below_three() {
        assert_eq!(
            series_trend(&[1.0, 2.0], GAIN_THRESHOLD),
            EfficiencyTrend::InsufficientData { completed: 2 }
        );
        assert!(series_trend(&[], GAIN_THRESHOLD).direction().is_none());
    }

    #[test]
    fn test_three_samples_compare_first_and_last() {
        match series_trend(&[10.0, 50.0, 30.0], GAIN_THRESHOLD) {
            EfficiencyTrend::Trend {
                early_mean,
                recent_mean,
                direction,
                ..
            } => {
                assert_eq!(early_mean, 10.0);
                assert_eq!(recent_mean, 30.0);
                assert_eq!(direction, TrendDirection::Improving);
            }
            other => panic!("unexpected trend: {other:?}"),
        }
    }

    #[test]
    fn test_degrading_and_stable() {
        assert_eq!(
            series_trend(&[80.0, 70.0, 60.0, 50.0, 40.0, 30.0], GAIN_THRESHOLD).direction(),
            Some(TrendDirection::Degrading)
        );
        assert_eq!(
            series_trend(&[50.0, 52.0, 48.0, 51.0], GAIN_THRESHOLD).direction(),
            Some(TrendDirection::Stable)
        );
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(EfficiencyTrend::InsufficientData { completed: 1 }).unwrap();
        assert_eq!(json["status"], "insufficientData");
        assert_eq!(json["completed"], 1);
    }
}
