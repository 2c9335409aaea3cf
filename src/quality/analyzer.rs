//! Quality analysis of generated implementations.
//!
//! [`QualityAnalyzer::analyze_quality`] never fails. Extraction or scoring
//! errors produce a [`QualityAnalysis::failed`] value with an overall score
//! of zero, so downstream aggregation always has a number to work with.
//!
//! # Example
//!
//! ```
//! use conductor::quality::QualityAnalyzer;
//! use conductor::task::Task;
//!
//! let analyzer = QualityAnalyzer::fixed();
//! let task = Task::new("t1", "Create a button");
//! let analysis = analyzer.analyze_quality("```tsx\nexport const Button = () => null;\n```", &task);
//! assert_eq!(analysis.overall_score, 7.2);
//!
//! let failed = analyzer.analyze_quality("   ", &task);
//! assert_eq!(failed.overall_score, 0.0);
//! assert!(failed.error.is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::metrics::{round1, QualityMetric};
use super::scoring::{FixedScoring, HeuristicScoring, MetricScores, ScoringStrategy};
use crate::config::ScoringMode;
use crate::error::{ConductorError, Result};
use crate::task::Task;

/// Metrics at or above this score are strengths.
pub const STRENGTH_THRESHOLD: f64 = 8.0;

/// Metrics below this score are weaknesses.
pub const WEAKNESS_THRESHOLD: f64 = 6.0;

/// Metrics below this score receive suggestions.
pub const SUGGESTION_THRESHOLD: f64 = 7.0;

/// Supporting bullets listed per strong or weak metric.
const MAX_BULLETS: usize = 2;

/// Suggestions generated when no metric is below the suggestion threshold.
const FALLBACK_SUGGESTIONS: usize = 2;

/// Weighted score for a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricScore {
    pub raw_score: f64,
    pub weight: f64,
    pub weighted_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

/// Result of analyzing one implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityAnalysis {
    /// Weighted overall score in `[0, 10]`, rounded to one decimal.
    pub overall_score: f64,
    pub per_metric: BTreeMap<QualityMetric, MetricScore>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    /// Set when the analysis failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QualityAnalysis {
    /// A zero-score analysis carrying `message` as its only weakness.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            overall_score: 0.0,
            per_metric: BTreeMap::new(),
            strengths: Vec::new(),
            weaknesses: vec![message.clone()],
            suggestions: Vec::new(),
            error: Some(message),
        }
    }

    /// Whether the analysis failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Raw score for `metric`, zero when absent.
    #[must_use]
    pub fn raw_score(&self, metric: QualityMetric) -> f64 {
        self.per_metric.get(&metric).map_or(0.0, |m| m.raw_score)
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("fence regex is valid"))
}

/// Extract code from an implementation.
///
/// Picks the longest fenced block; without fences the whole text is code.
///
/// # Errors
///
/// Returns an analysis error when nothing but whitespace remains.
pub fn extract_code(implementation: &str) -> Result<String> {
    let longest = fence_regex()
        .captures_iter(implementation)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .max_by_key(|block| block.chars().count());

    let code = longest.unwrap_or(implementation).trim();
    if code.is_empty() {
        return Err(ConductorError::analysis("no extractable code in implementation"));
    }
    Ok(code.to_string())
}

/// Scores implementations with a pluggable [`ScoringStrategy`].
pub struct QualityAnalyzer {
    strategy: Box<dyn ScoringStrategy>,
}

impl QualityAnalyzer {
    /// Create an analyzer using `strategy`.
    #[must_use]
    pub fn new(strategy: impl ScoringStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Analyzer with constant scores.
    #[must_use]
    pub fn fixed() -> Self {
        Self::new(FixedScoring)
    }

    /// Analyzer with text-signal heuristics.
    #[must_use]
    pub fn heuristic() -> Self {
        Self::new(HeuristicScoring)
    }

    /// Analyzer for a configured scoring mode.
    #[must_use]
    pub fn from_mode(mode: ScoringMode) -> Self {
        match mode {
            ScoringMode::Fixed => Self::fixed(),
            ScoringMode::Heuristic => Self::heuristic(),
        }
    }

    /// Name of the active strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Analyze `implementation` for `task`. Never fails.
    #[must_use]
    pub fn analyze_quality(&self, implementation: &str, task: &Task) -> QualityAnalysis {
        match self.try_analyze(implementation, task) {
            Ok(analysis) => {
                debug!(
                    task_id = %task.id,
                    strategy = self.strategy.name(),
                    score = analysis.overall_score,
                    "Quality analysis complete"
                );
                analysis
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Quality analysis failed");
                QualityAnalysis::failed(e.to_string())
            }
        }
    }

    fn try_analyze(&self, implementation: &str, task: &Task) -> Result<QualityAnalysis> {
        let code = extract_code(implementation)?;
        let scores = self.strategy.score(&code, implementation, task)?;
        aggregate(scores)
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl std::fmt::Debug for QualityAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityAnalyzer")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

fn describe(metric: QualityMetric, raw: f64, bullets: &[String]) -> String {
    if bullets.is_empty() {
        format!("{} ({:.1}/10)", metric.label(), raw)
    } else {
        format!("{} ({:.1}/10): {}", metric.label(), raw, bullets.join("; "))
    }
}

/// Combine raw scores into a [`QualityAnalysis`].
///
/// # Errors
///
/// Returns an analysis error if a metric is missing or not a finite score.
pub fn aggregate(mut scores: MetricScores) -> Result<QualityAnalysis> {
    let mut per_metric = BTreeMap::new();
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut total = 0.0;

    for metric in QualityMetric::ALL {
        let score = scores
            .remove(&metric)
            .ok_or_else(|| ConductorError::analysis(format!("no score for metric {}", metric)))?;
        if !score.raw.is_finite() {
            return Err(ConductorError::analysis(format!("invalid score for metric {}", metric)));
        }
        let raw = score.raw.clamp(0.0, 10.0);
        let weighted = raw * metric.weight();
        total += weighted;

        if raw >= STRENGTH_THRESHOLD {
            let bullets: Vec<String> = score.strengths.iter().take(MAX_BULLETS).cloned().collect();
            strengths.push(describe(metric, raw, &bullets));
        }
        if raw < WEAKNESS_THRESHOLD {
            let bullets: Vec<String> = score.weaknesses.iter().take(MAX_BULLETS).cloned().collect();
            weaknesses.push(describe(metric, raw, &bullets));
        }

        per_metric.insert(
            metric,
            MetricScore {
                raw_score: raw,
                weight: metric.weight(),
                weighted_score: weighted,
                strengths: score.strengths,
                weaknesses: score.weaknesses,
            },
        );
    }

    let suggestions = suggestions(&per_metric);
    Ok(QualityAnalysis {
        overall_score: round1(total),
        per_metric,
        strengths,
        weaknesses,
        suggestions,
        error: None,
    })
}

fn suggestions(per_metric: &BTreeMap<QualityMetric, MetricScore>) -> Vec<String> {
    let mut ordered: Vec<(QualityMetric, &MetricScore)> = QualityMetric::ALL
        .into_iter()
        .filter_map(|m| per_metric.get(&m).map(|s| (m, s)))
        .collect();
    ordered.sort_by(|a, b| a.1.raw_score.total_cmp(&b.1.raw_score));

    let low: Vec<_> = ordered
        .iter()
        .filter(|(_, s)| s.raw_score < SUGGESTION_THRESHOLD)
        .collect();
    let targets: Vec<_> = if low.is_empty() {
        ordered.iter().take(FALLBACK_SUGGESTIONS).collect()
    } else {
        low
    };

    targets
        .into_iter()
        .map(|(metric, score)| {
            let text = score
                .weaknesses
                .first()
                .map_or(metric.fallback_suggestion(), String::as_str);
            format!("{}: {}", metric.label(), text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::scoring::RawScore;

    fn task() -> Task {
        Task::new("t1", "Create a login form component with validation")
    }

    #[test]
    fn test_extract_longest_fence() {
        let text = "Intro\n```ts\nshort\n```\nmore\n```tsx\nthis block is longer\n```\n";
        assert_eq!(extract_code(text).unwrap(), "this block is longer");
    }

    #[test]
    fn test_extract_raw_text_without_fence() {
        assert_eq!(extract_code("  const a = 1;  ").unwrap(), "const a = 1;");
    }

    #[test]
    fn test_extract_empty_is_analysis_error() {
        let err = extract_code("\n  \n").unwrap_err();
        assert!(matches!(err, ConductorError::Analysis { .. }));
    }

    #[test]
    fn test_fixed_overall_score() {
        let analysis = QualityAnalyzer::fixed().analyze_quality("const a = 1;", &task());
        assert_eq!(analysis.overall_score, 7.2);
        assert_eq!(analysis.per_metric.len(), 8);
        assert!(analysis.error.is_none());
        // functionality and token efficiency are >= 8
        assert_eq!(analysis.strengths.len(), 2);
        assert!(analysis.strengths[0].starts_with("Functionality (8.0/10): "));
        assert!(analysis.weaknesses.is_empty());
    }

    #[test]
    fn test_suggestions_target_metrics_below_seven() {
        let analysis = QualityAnalyzer::fixed().analyze_quality("x", &task());
        assert_eq!(
            analysis.suggestions,
            vec!["Accessibility: Limited accessibility attributes".to_string()]
        );
    }

    #[test]
    fn test_suggestions_fall_back_to_two_lowest() {
        let mut scores = MetricScores::new();
        for metric in QualityMetric::ALL {
            scores.insert(metric, RawScore::new(9.0));
        }
        scores.insert(QualityMetric::Performance, RawScore::new(7.5));
        scores.insert(QualityMetric::Architecture, RawScore::new(8.0));

        let analysis = aggregate(scores).unwrap();
        assert_eq!(analysis.suggestions.len(), 2);
        assert!(analysis.suggestions[0].starts_with("Performance: "));
        assert!(analysis.suggestions[1].starts_with("Architecture: "));
        assert!(analysis.suggestions[0].contains(QualityMetric::Performance.fallback_suggestion()));
    }

    #[test]
    fn test_weaknesses_below_six() {
        let mut scores = MetricScores::new();
        for metric in QualityMetric::ALL {
            scores.insert(metric, RawScore::new(7.0));
        }
        scores.insert(
            QualityMetric::ErrorHandling,
            RawScore::new(3.0).with_weakness("No try/catch"),
        );
        let analysis = aggregate(scores).unwrap();
        assert_eq!(analysis.weaknesses, vec!["Error handling (3.0/10): No try/catch".to_string()]);
        assert_eq!(analysis.overall_score, round1(7.0 - 4.0 * 0.15));
    }

    #[test]
    fn test_bullets_capped_for_strengths_and_weaknesses() {
        let mut scores = MetricScores::new();
        for metric in QualityMetric::ALL {
            scores.insert(metric, RawScore::new(7.0));
        }
        scores.insert(
            QualityMetric::Performance,
            RawScore::new(2.0).with_weakness("a").with_weakness("b").with_weakness("c"),
        );
        scores.insert(
            QualityMetric::Functionality,
            RawScore::new(9.0).with_strength("x").with_strength("y").with_strength("z"),
        );
        let analysis = aggregate(scores).unwrap();
        assert_eq!(analysis.weaknesses, vec!["Performance (2.0/10): a; b".to_string()]);
        assert_eq!(analysis.strengths, vec!["Functionality (9.0/10): x; y".to_string()]);
    }

    #[test]
    fn test_missing_metric_fails_softly() {
        struct Partial;
        impl ScoringStrategy for Partial {
            fn name(&self) -> &str {
                "partial"
            }
            fn score(&self, _: &str, _: &str, _: &Task) -> Result<MetricScores> {
                Ok(MetricScores::new())
            }
        }

        let analysis = QualityAnalyzer::new(Partial).analyze_quality("code", &task());
        assert_eq!(analysis.overall_score, 0.0);
        assert_eq!(analysis.weaknesses.len(), 1);
        assert!(analysis.is_failed());
    }

    #[test]
    fn test_empty_implementation_yields_failed_analysis() {
        let analysis = QualityAnalyzer::heuristic().analyze_quality("", &task());
        assert_eq!(analysis.overall_score, 0.0);
        assert_eq!(analysis.weaknesses, vec![analysis.error.clone().unwrap()]);
    }

    #[test]
    fn test_failed_analysis_serializes_error() {
        let json = serde_json::to_value(QualityAnalysis::failed("boom")).unwrap();
        assert_eq!(json["overallScore"], 0.0);
        assert_eq!(json["error"], "boom");
    }
}
