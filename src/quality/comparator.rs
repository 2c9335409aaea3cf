//! Side-by-side comparison of implementations from several tools.
//!
//! Each implementation is scored by a [`QualityAnalyzer`], ranked by overall
//! score (stable, so ties keep input order), and compared metric by metric.
//! The report also derives common strengths and weaknesses, patterns among
//! the top third, and textual findings.
//!
//! # Example
//!
//! ```
//! use conductor::quality::{Implementation, ImplementationComparator, QualityAnalyzer};
//! use conductor::task::Task;
//!
//! let comparator = ImplementationComparator::new(QualityAnalyzer::fixed());
//! let task = Task::new("t1", "Create a button");
//! let report = comparator
//!     .compare(
//!         &[
//!             Implementation::new("claude", "export const A = 1;"),
//!             Implementation::new("ui-specialist", "export const B = 2;"),
//!         ],
//!         &task,
//!     )
//!     .unwrap();
//! assert_eq!(report.findings.best_tool, "claude");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::analyzer::{QualityAnalysis, QualityAnalyzer, STRENGTH_THRESHOLD, WEAKNESS_THRESHOLD};
use super::metrics::QualityMetric;
use crate::error::{ConductorError, Result};
use crate::task::Task;

/// Minimum spread (points) for a per-metric leader finding.
pub const LEADER_SPREAD: f64 = 2.0;

/// An implementation tagged with the tool that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub tool: String,
    pub content: String,
}

impl Implementation {
    /// Create an implementation.
    #[must_use]
    pub fn new(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            content: content.into(),
        }
    }
}

/// One entry in the overall ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedImplementation {
    /// 1-based rank.
    pub rank: usize,
    pub tool: String,
    pub overall_score: f64,
    pub analysis: QualityAnalysis,
}

/// A tool's score on one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolScore {
    pub tool: String,
    pub score: f64,
    /// 1-based rank on this metric.
    pub rank: usize,
}

/// All tools compared on one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricComparison {
    pub metric: QualityMetric,
    /// Scores ordered by rank.
    pub scores: Vec<ToolScore>,
    pub average: f64,
    /// Highest minus lowest score.
    pub spread: f64,
}

impl MetricComparison {
    /// Best-scoring tool on this metric.
    #[must_use]
    pub fn leader(&self) -> Option<&ToolScore> {
        self.scores.first()
    }
}

/// How often a tool appears among the top third.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFrequency {
    pub tool: String,
    pub count: usize,
}

/// Patterns among the top third of the ranking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPatterns {
    /// Size of the top third.
    pub top_count: usize,
    /// Tools appearing at least twice.
    pub frequent_tools: Vec<ToolFrequency>,
    /// Metrics where at least half of the top third score as strengths.
    pub dominant_metrics: Vec<QualityMetric>,
}

/// A tool that clearly leads one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLeader {
    pub metric: QualityMetric,
    pub tool: String,
    pub score: f64,
    pub spread: f64,
}

/// Conclusions drawn from the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub best_tool: String,
    pub best_score: f64,
    pub metric_leaders: Vec<MetricLeader>,
    pub template_improvements: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Full comparison output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub task_id: String,
    pub ranked: Vec<RankedImplementation>,
    pub metric_comparisons: Vec<MetricComparison>,
    pub common_strengths: Vec<QualityMetric>,
    pub common_weaknesses: Vec<QualityMetric>,
    pub patterns: TopPatterns,
    pub findings: Findings,
}

impl ComparisonReport {
    /// Comparison for one metric.
    #[must_use]
    pub fn metric(&self, metric: QualityMetric) -> Option<&MetricComparison> {
        self.metric_comparisons.iter().find(|c| c.metric == metric)
    }
}

/// Ranks and compares implementations.
#[derive(Debug, Default)]
pub struct ImplementationComparator {
    analyzer: QualityAnalyzer,
}

impl ImplementationComparator {
    /// Create a comparator scoring with `analyzer`.
    #[must_use]
    pub fn new(analyzer: QualityAnalyzer) -> Self {
        Self { analyzer }
    }

    /// The analyzer used for scoring.
    #[must_use]
    pub fn analyzer(&self) -> &QualityAnalyzer {
        &self.analyzer
    }

    /// Score and compare `implementations` of `task`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `implementations` is empty.
    pub fn compare(&self, implementations: &[Implementation], task: &Task) -> Result<ComparisonReport> {
        let analyses = implementations
            .iter()
            .map(|i| (i.tool.clone(), self.analyzer.analyze_quality(&i.content, task)))
            .collect();
        self.compare_analyses(analyses, task)
    }

    /// Compare already-computed analyses, given as `(tool, analysis)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `analyses` is empty.
    pub fn compare_analyses(
        &self,
        analyses: Vec<(String, QualityAnalysis)>,
        task: &Task,
    ) -> Result<ComparisonReport> {
        if analyses.is_empty() {
            return Err(ConductorError::validation(
                "implementations",
                "at least one implementation is required",
            ));
        }

        let ranked = rank(analyses);
        let metric_comparisons: Vec<MetricComparison> =
            QualityMetric::ALL.into_iter().map(|m| compare_metric(&ranked, m)).collect();
        let common_strengths = majority(&ranked, |score| score >= STRENGTH_THRESHOLD);
        let common_weaknesses = majority(&ranked, |score| score < WEAKNESS_THRESHOLD);
        let patterns = top_patterns(&ranked);
        let findings = findings(&ranked, &metric_comparisons, &common_weaknesses, &patterns);

        Ok(ComparisonReport {
            task_id: task.id.clone(),
            ranked,
            metric_comparisons,
            common_strengths,
            common_weaknesses,
            patterns,
            findings,
        })
    }
}

// ============================================================================
// Ranking
// ============================================================================

fn rank(analyses: Vec<(String, QualityAnalysis)>) -> Vec<RankedImplementation> {
    let mut entries: Vec<(String, QualityAnalysis)> = analyses;
    // sort_by is stable: equal scores keep input order
    entries.sort_by(|a, b| b.1.overall_score.total_cmp(&a.1.overall_score));
    entries
        .into_iter()
        .enumerate()
        .map(|(i, (tool, analysis))| RankedImplementation {
            rank: i + 1,
            tool,
            overall_score: analysis.overall_score,
            analysis,
        })
        .collect()
}

fn compare_metric(ranked: &[RankedImplementation], metric: QualityMetric) -> MetricComparison {
    let mut scores: Vec<(String, f64)> = ranked
        .iter()
        .map(|r| (r.tool.clone(), r.analysis.raw_score(metric)))
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let values: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let average = values.iter().sum::<f64>() / values.len() as f64;

    MetricComparison {
        metric,
        scores: scores
            .into_iter()
            .enumerate()
            .map(|(i, (tool, score))| ToolScore {
                tool,
                score,
                rank: i + 1,
            })
            .collect(),
        average,
        spread: max - min,
    }
}

/// Metrics where more than half of the scored implementations satisfy
/// `pred`. Failed analyses count on neither side.
fn majority(ranked: &[RankedImplementation], pred: impl Fn(f64) -> bool) -> Vec<QualityMetric> {
    let scored: Vec<&RankedImplementation> = ranked.iter().filter(|r| !r.analysis.is_failed()).collect();
    QualityMetric::ALL
        .into_iter()
        .filter(|&metric| {
            let hits = scored.iter().filter(|r| pred(r.analysis.raw_score(metric))).count();
            hits * 2 > scored.len()
        })
        .collect()
}

fn top_patterns(ranked: &[RankedImplementation]) -> TopPatterns {
    let top_count = ranked.len().div_ceil(3);
    let top = &ranked[..top_count];

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in top {
        *counts.entry(entry.tool.as_str()).or_default() += 1;
    }
    // report in order of first appearance
    let mut frequent_tools: Vec<ToolFrequency> = Vec::new();
    for entry in top {
        let count = counts[entry.tool.as_str()];
        if count >= 2 && !frequent_tools.iter().any(|f| f.tool == entry.tool) {
            frequent_tools.push(ToolFrequency {
                tool: entry.tool.clone(),
                count,
            });
        }
    }

    let dominant_metrics = QualityMetric::ALL
        .into_iter()
        .filter(|&metric| {
            let strong = top
                .iter()
                .filter(|r| r.analysis.raw_score(metric) >= STRENGTH_THRESHOLD)
                .count();
            strong > 0 && strong * 2 >= top_count
        })
        .collect();

    TopPatterns {
        top_count,
        frequent_tools,
        dominant_metrics,
    }
}

fn findings(
    ranked: &[RankedImplementation],
    comparisons: &[MetricComparison],
    common_weaknesses: &[QualityMetric],
    patterns: &TopPatterns,
) -> Findings {
    let best = &ranked[0];
    let mut recommendations = vec![format!(
        "Use {} for similar tasks (overall {:.1}/10)",
        best.tool, best.overall_score
    )];

    let metric_leaders: Vec<MetricLeader> = comparisons
        .iter()
        .filter(|c| c.spread >= LEADER_SPREAD)
        .filter_map(|c| {
            c.leader().map(|leader| MetricLeader {
                metric: c.metric,
                tool: leader.tool.clone(),
                score: leader.score,
                spread: c.spread,
            })
        })
        .collect();
    for leader in &metric_leaders {
        recommendations.push(format!(
            "Prefer {} when {} matters ({:.1}/10, {:.1} points ahead of the weakest)",
            leader.tool,
            leader.metric.label().to_lowercase(),
            leader.score,
            leader.spread
        ));
    }

    for tool in &patterns.frequent_tools {
        recommendations.push(format!(
            "{} produced {} of the top {} implementations",
            tool.tool, tool.count, patterns.top_count
        ));
    }

    let template_improvements: Vec<String> = common_weaknesses
        .iter()
        .map(|m| format!("Improve templates for {}: {}", m.label().to_lowercase(), m.fallback_suggestion()))
        .collect();
    recommendations.extend(template_improvements.iter().cloned());

    Findings {
        best_tool: best.tool.clone(),
        best_score: best.overall_score,
        metric_leaders,
        template_improvements,
        recommendations,
    }
}
