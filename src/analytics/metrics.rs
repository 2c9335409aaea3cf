//! Aggregate metrics across processed tasks.
//!
//! The collector keeps running totals (tokens by tool and by task type),
//! incremental means of quality and efficiency, success/failure counters and
//! a bounded timeline of recent tasks. State persists to
//! `.conductor/metrics.json`.
//!
//! Efficiency here is `direct / delegated`, where `direct` is the analyzer's
//! independent estimate of unassisted cost. A baseline derived as a fixed
//! multiple of the observed tokens would make the ratio that constant for
//! every task, so it is not used.

use super::reporting::{percent, ReportFormat};
use super::trends::{series_trend, EfficiencyTrend, QUALITY_THRESHOLD};
use crate::config::DATA_DIR;
use crate::error::Result;
use crate::task::{Complexity, Task, TaskType};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of processing one task, as fed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetrics {
    /// Analyzed task type.
    pub task_type: TaskType,
    pub complexity: Complexity,
    /// Tool whose implementation was kept.
    pub tool: Option<String>,
    /// Tokens spent by `tool` alone.
    #[serde(default)]
    pub tool_tokens: u64,
    /// Delegated tokens actually spent, summed over every attempt.
    pub tokens_used: u64,
    /// Estimated unassisted cost.
    pub direct_estimate: u64,
    pub quality_score: Option<f64>,
    pub success: bool,
    pub duration_ms: u64,
}

impl TaskMetrics {
    /// Direct over delegated, when both are positive.
    #[must_use]
    pub fn efficiency(&self) -> Option<f64> {
        (self.direct_estimate > 0 && self.tokens_used > 0)
            .then(|| self.direct_estimate as f64 / self.tokens_used as f64)
    }
}

/// Running aggregate for a tool or task type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetrics {
    pub tasks: u64,
    pub tokens: u64,
    pub average_quality: f64,
    pub quality_samples: u64,
}

impl GroupMetrics {
    fn record(&mut self, tokens: u64, quality: Option<f64>) {
        self.tasks += 1;
        self.tokens += tokens;
        if let Some(score) = quality {
            running_mean(&mut self.average_quality, &mut self.quality_samples, score);
        }
    }
}

/// One entry of the recent-task timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub task_type: TaskType,
    pub tool: Option<String>,
    pub tokens: u64,
    pub quality: Option<f64>,
    pub efficiency: Option<f64>,
    pub success: bool,
}

/// `avg = (avg * (n - 1) + new) / n`, written incrementally.
fn running_mean(avg: &mut f64, count: &mut u64, value: f64) {
    *count += 1;
    *avg += (value - *avg) / *count as f64;
}

/// Persisted collector state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsData {
    pub version: u32,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub total_tokens: u64,
    pub average_quality: f64,
    pub quality_samples: u64,
    pub average_efficiency: f64,
    pub efficiency_samples: u64,
    pub by_tool: BTreeMap<String, GroupMetrics>,
    pub by_type: BTreeMap<String, GroupMetrics>,
    pub recent: VecDeque<TimelineEntry>,
}

impl Default for MetricsData {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            total_tokens: 0,
            average_quality: 0.0,
            quality_samples: 0,
            average_efficiency: 0.0,
            efficiency_samples: 0,
            by_tool: BTreeMap::new(),
            by_type: BTreeMap::new(),
            recent: VecDeque::new(),
        }
    }
}

impl MetricsData {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Fraction of tasks that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }
}

/// A labelled value for charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
}

/// Headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate: f64,
    pub total_tokens: u64,
    pub average_quality: f64,
    pub average_efficiency: f64,
}

/// Chart-ready view of the collected metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationData {
    pub summary: MetricsSummary,
    pub tokens_by_tool: Vec<DataPoint>,
    pub tokens_by_type: Vec<DataPoint>,
    pub quality_by_tool: Vec<DataPoint>,
    pub quality_trend: EfficiencyTrend,
    pub timeline: Vec<TimelineEntry>,
}

/// Full report document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsReport<'a> {
    generated_at: DateTime<Utc>,
    summary: MetricsSummary,
    by_tool: &'a BTreeMap<String, GroupMetrics>,
    by_type: &'a BTreeMap<String, GroupMetrics>,
    quality_trend: EfficiencyTrend,
    recent: &'a VecDeque<TimelineEntry>,
}

/// Metrics collector with persistence.
#[derive(Debug)]
pub struct MetricsCollector {
    metrics_file: Option<PathBuf>,
    data: MetricsData,
    dirty: bool,
}

impl MetricsCollector {
    /// Maximum number of timeline entries to keep.
    pub const MAX_RECENT_TASKS: usize = 100;

    /// Open the collector for a project directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics file exists but cannot be parsed.
    pub fn open(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let metrics_file = Self::metrics_path(project_dir.as_ref());
        let data = if metrics_file.exists() {
            let file = File::open(&metrics_file).context("Failed to open metrics file")?;
            serde_json::from_reader(BufReader::new(file)).context("Failed to parse metrics file")?
        } else {
            MetricsData::default()
        };

        Ok(Self {
            metrics_file: Some(metrics_file),
            data,
            dirty: false,
        })
    }

    /// Create a collector that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            metrics_file: None,
            data: MetricsData::default(),
            dirty: false,
        }
    }

    /// Location of the metrics file for a project.
    pub fn metrics_path(project_dir: &Path) -> PathBuf {
        project_dir.join(DATA_DIR).join("metrics.json")
    }

    /// Collected data.
    #[must_use]
    pub fn data(&self) -> &MetricsData {
        &self.data
    }

    /// Fold one task result into the aggregates.
    pub fn record_task_metrics(&mut self, task: &Task, result: &TaskMetrics) {
        let data = &mut self.data;
        data.total_tasks += 1;
        if result.success {
            data.successful_tasks += 1;
        } else {
            data.failed_tasks += 1;
        }
        data.total_tokens += result.tokens_used;

        if let Some(score) = result.quality_score {
            running_mean(&mut data.average_quality, &mut data.quality_samples, score);
        }
        let efficiency = result.efficiency();
        if let Some(ratio) = efficiency {
            running_mean(&mut data.average_efficiency, &mut data.efficiency_samples, ratio);
        }

        if let Some(tool) = &result.tool {
            data.by_tool
                .entry(tool.clone())
                .or_default()
                .record(result.tool_tokens, result.quality_score);
        }
        data.by_type
            .entry(result.task_type.to_string())
            .or_default()
            .record(result.tokens_used, result.quality_score);

        if data.recent.len() >= Self::MAX_RECENT_TASKS {
            data.recent.pop_front();
        }
        data.recent.push_back(TimelineEntry {
            task_id: task.id.clone(),
            timestamp: Utc::now(),
            task_type: result.task_type,
            tool: result.tool.clone(),
            tokens: result.tokens_used,
            quality: result.quality_score,
            efficiency,
            success: result.success,
        });

        self.dirty = true;
        debug!(task_id = %task.id, success = result.success, "Recorded task metrics");
    }

    /// Headline numbers.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_tasks: self.data.total_tasks,
            successful_tasks: self.data.successful_tasks,
            failed_tasks: self.data.failed_tasks,
            success_rate: self.data.success_rate(),
            total_tokens: self.data.total_tokens,
            average_quality: self.data.average_quality,
            average_efficiency: self.data.average_efficiency,
        }
    }

    fn quality_trend(&self) -> EfficiencyTrend {
        let scores: Vec<f64> = self.data.recent.iter().filter_map(|e| e.quality).collect();
        series_trend(&scores, QUALITY_THRESHOLD)
    }

    /// Chart-ready data.
    #[must_use]
    pub fn get_visualization_data(&self) -> VisualizationData {
        let points = |groups: &BTreeMap<String, GroupMetrics>, value: fn(&GroupMetrics) -> f64| {
            groups
                .iter()
                .map(|(label, g)| DataPoint {
                    label: label.clone(),
                    value: value(g),
                })
                .collect::<Vec<_>>()
        };

        VisualizationData {
            summary: self.summary(),
            tokens_by_tool: points(&self.data.by_tool, |g| g.tokens as f64),
            tokens_by_type: points(&self.data.by_type, |g| g.tokens as f64),
            quality_by_tool: points(&self.data.by_tool, |g| g.average_quality),
            quality_trend: self.quality_trend(),
            timeline: self.data.recent.iter().cloned().collect(),
        }
    }

    /// Render a report.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn generate_report(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(&self.report())?),
            ReportFormat::Markdown => Ok(self.to_markdown()),
        }
    }

    fn report(&self) -> MetricsReport<'_> {
        MetricsReport {
            generated_at: Utc::now(),
            summary: self.summary(),
            by_tool: &self.data.by_tool,
            by_type: &self.data.by_type,
            quality_trend: self.quality_trend(),
            recent: &self.data.recent,
        }
    }

    fn to_markdown(&self) -> String {
        let summary = self.summary();
        let mut md = String::new();

        md.push_str("# Conductor Metrics Report\n\n");
        let _ = writeln!(md, "Generated: {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        let _ = writeln!(md, "| Tasks | {} |", summary.total_tasks);
        let _ = writeln!(md, "| Successful | {} |", summary.successful_tasks);
        let _ = writeln!(md, "| Failed | {} |", summary.failed_tasks);
        let _ = writeln!(md, "| Success Rate | {} |", percent(summary.success_rate));
        let _ = writeln!(md, "| Total Tokens | {} |", summary.total_tokens);
        let _ = writeln!(md, "| Average Quality | {:.1} |", summary.average_quality);
        let _ = writeln!(md, "| Average Efficiency | {:.2}x |", summary.average_efficiency);

        for (title, groups) in [("By Tool", &self.data.by_tool), ("By Task Type", &self.data.by_type)] {
            if groups.is_empty() {
                continue;
            }
            let _ = writeln!(md, "\n## {}\n", title);
            md.push_str("| Name | Tasks | Tokens | Avg Quality |\n|------|-------|--------|-------------|\n");
            for (name, g) in groups {
                let _ = writeln!(md, "| {} | {} | {} | {:.1} |", name, g.tasks, g.tokens, g.average_quality);
            }
        }

        md.push_str("\n## Quality Trend\n\n");
        match self.quality_trend() {
            EfficiencyTrend::InsufficientData { completed } => {
                let _ = writeln!(md, "Insufficient data ({} scored tasks, need 3).", completed);
            }
            EfficiencyTrend::Trend {
                direction, change, ..
            } => {
                let _ = writeln!(md, "{} ({:+.1} points)", direction, change);
            }
        }

        md
    }

    /// Check if data has been modified since last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save metrics to disk. In-memory collectors do nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.metrics_file else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create .conductor directory")?;
        }
        let file = File::create(path).context("Failed to create metrics file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.data)
            .context("Failed to write metrics file")?;

        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(tool: &str, tokens: u64, direct: u64, quality: Option<f64>, success: bool) -> TaskMetrics {
        TaskMetrics {
            task_type: TaskType::Ui,
            complexity: Complexity::Medium,
            tool: Some(tool.to_string()),
            tool_tokens: tokens,
            tokens_used: tokens,
            direct_estimate: direct,
            quality_score: quality,
            success,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_running_mean_matches_batch_mean() {
        let mut collector = MetricsCollector::in_memory();
        for (i, q) in [6.0, 8.0, 7.0, 9.0].iter().enumerate() {
            collector.record_task_metrics(
                &Task::new(format!("t{i}"), "x"),
                &result("claude", 100, 400, Some(*q), true),
            );
        }
        assert!((collector.data().average_quality - 7.5).abs() < 1e-9);
        assert_eq!(collector.data().quality_samples, 4);
    }

    #[test]
    fn test_efficiency_uses_independent_baseline() {
        let mut collector = MetricsCollector::in_memory();
        collector.record_task_metrics(&Task::new("a", "x"), &result("claude", 300, 1200, None, true));
        collector.record_task_metrics(&Task::new("b", "x"), &result("claude", 500, 1000, None, true));
        assert!((collector.data().average_efficiency - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_skips_zero_tokens() {
        let mut collector = MetricsCollector::in_memory();
        collector.record_task_metrics(&Task::new("a", "x"), &result("claude", 0, 1200, None, false));
        assert_eq!(collector.data().efficiency_samples, 0);
        assert_eq!(collector.data().failed_tasks, 1);
        assert_eq!(collector.data().success_rate(), 0.0);
    }

    #[test]
    fn test_groups_by_tool_and_type() {
        let mut collector = MetricsCollector::in_memory();
        collector.record_task_metrics(&Task::new("a", "x"), &result("claude", 100, 0, Some(8.0), true));
        collector.record_task_metrics(&Task::new("b", "x"), &result("ui-specialist", 50, 0, Some(6.0), true));
        collector.record_task_metrics(&Task::new("c", "x"), &result("claude", 150, 0, Some(6.0), true));

        let data = collector.data();
        assert_eq!(data.by_tool["claude"].tasks, 2);
        assert_eq!(data.by_tool["claude"].tokens, 250);
        assert!((data.by_tool["claude"].average_quality - 7.0).abs() < 1e-9);
        assert_eq!(data.by_type["ui"].tokens, 300);

        let viz = collector.get_visualization_data();
        assert_eq!(viz.tokens_by_tool.len(), 2);
        assert_eq!(viz.tokens_by_tool[0].label, "claude");
        assert_eq!(viz.tokens_by_tool[0].value, 250.0);
        assert_eq!(viz.timeline.len(), 3);
        assert!(viz.quality_trend.direction().is_some());
    }

    #[test]
    fn test_tool_charged_with_its_own_spend() {
        let mut collector = MetricsCollector::in_memory();
        let mut multi = result("ui-specialist", 1100, 2000, Some(8.0), true);
        multi.tool_tokens = 1000;
        collector.record_task_metrics(&Task::new("a", "x"), &multi);

        let data = collector.data();
        assert_eq!(data.by_tool["ui-specialist"].tokens, 1000);
        assert_eq!(data.total_tokens, 1100);
        assert_eq!(data.by_type["ui"].tokens, 1100);
    }

    #[test]
    fn test_timeline_is_bounded() {
        let mut collector = MetricsCollector::in_memory();
        for i in 0..(MetricsCollector::MAX_RECENT_TASKS + 5) {
            collector.record_task_metrics(&Task::new(format!("t{i}"), "x"), &result("claude", 1, 1, None, true));
        }
        let data = collector.data();
        assert_eq!(data.recent.len(), MetricsCollector::MAX_RECENT_TASKS);
        assert_eq!(data.recent.front().unwrap().task_id, "t5");
        assert_eq!(data.total_tasks, 105);
    }

    #[test]
    fn test_reports() {
        let mut collector = MetricsCollector::in_memory();
        collector.record_task_metrics(&Task::new("a", "x"), &result("claude", 300, 1200, Some(8.5), true));

        let json = collector.generate_report(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["totalTasks"], 1);
        assert_eq!(value["byTool"]["claude"]["tokens"], 300);

        let md = collector.generate_report(ReportFormat::Markdown).unwrap();
        assert!(md.contains("# Conductor Metrics Report"));
        assert!(md.contains("| Success Rate | 100.0% |"));
        assert!(md.contains("| claude | 1 | 300 | 8.5 |"));
        assert!(md.contains("Insufficient data"));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut collector = MetricsCollector::open(temp.path()).unwrap();
        collector.record_task_metrics(&Task::new("a", "x"), &result("claude", 10, 40, Some(7.0), true));
        collector.save().unwrap();

        let reopened = MetricsCollector::open(temp.path()).unwrap();
        assert_eq!(reopened.data(), collector.data());
        assert!(!reopened.is_dirty());
    }
}
