//! Token accounting for direct versus delegated implementation.
//!
//! Each task gets one [`TokenUsageRecord`]. The direct cost is an estimate
//! of what writing the code unassisted would take; delegated costs are
//! recorded per tool attempt, and only the cheapest attempt is kept as the
//! task's delegated cost. Completed records are appended to a history that
//! persists to `.conductor/token_usage.json`.
//!
//! # Example
//!
//! ```
//! use conductor::analytics::tokens::{PhaseCost, TokenTracker};
//! use conductor::task::{Complexity, TaskType};
//!
//! let mut tracker = TokenTracker::in_memory();
//! tracker.start_task("t1", TaskType::Ui, Complexity::Medium).unwrap();
//! tracker.record_direct_cost("t1", 1200).unwrap();
//! tracker.record_delegated_cost("t1", "claude", PhaseCost::from_total(300)).unwrap();
//!
//! let report = tracker.compare_efficiency("t1").unwrap();
//! assert_eq!(format!("{:.2}", report.efficiency_gain), "75.00");
//! ```

use super::trends::{analyze_efficiency_trend, EfficiencyTrend};
use crate::config::DATA_DIR;
use crate::error::{ConductorError, Result};
use crate::task::{Complexity, TaskType};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// =============================================================================
// Records
// =============================================================================

/// Lifecycle state of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Completed,
}

/// Tokens spent by one tool attempt, split by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCost {
    pub analysis: u64,
    pub delegation: u64,
    pub review: u64,
    pub total: u64,
    pub time_spent_ms: u64,
}

impl PhaseCost {
    /// Build a cost from its phases; the total is their sum.
    #[must_use]
    pub fn new(analysis: u64, delegation: u64, review: u64) -> Self {
        Self {
            analysis,
            delegation,
            review,
            total: analysis + delegation + review,
            time_spent_ms: 0,
        }
    }

    /// A cost with only a total, attributed to delegation.
    #[must_use]
    pub fn from_total(total: u64) -> Self {
        Self::new(0, total, 0)
    }

    /// Set the wall time of the attempt.
    #[must_use]
    pub fn with_time_spent(mut self, ms: u64) -> Self {
        self.time_spent_ms = ms;
        self
    }
}

/// The cheapest delegated attempt seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedCost {
    pub analysis: u64,
    pub delegation: u64,
    pub review: u64,
    pub total: u64,
    pub tool_name: Option<String>,
    pub time_spent_ms: u64,
}

/// Token usage of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRecord {
    pub task_id: String,
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub direct: u64,
    pub delegated: DelegatedCost,
    pub per_tool: BTreeMap<String, PhaseCost>,
    pub status: TaskStatus,
    pub quality_score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
}

impl TokenUsageRecord {
    fn new(task_id: &str, task_type: TaskType, complexity: Complexity) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_type,
            complexity,
            direct: 0,
            delegated: DelegatedCost::default(),
            per_tool: BTreeMap::new(),
            status: TaskStatus::Started,
            quality_score: None,
            started_at: Utc::now(),
            completed_at: None,
            elapsed_ms: None,
        }
    }

    /// Efficiency figures for this record.
    #[must_use]
    pub fn efficiency(&self) -> EfficiencyReport {
        EfficiencyReport::compute(self)
    }

    /// Tokens spent across every tool attempt, not just the cheapest.
    #[must_use]
    pub fn tokens_spent(&self) -> u64 {
        self.per_tool.values().map(|c| c.total).sum()
    }

    /// Tokens spent by one tool, zero if it was never tried.
    #[must_use]
    pub fn tool_tokens(&self, tool: &str) -> u64 {
        self.per_tool.get(tool).map_or(0, |c| c.total)
    }
}

// =============================================================================
// Efficiency
// =============================================================================

/// Direct versus delegated comparison for one task.
///
/// Gain and ratio are zero unless both the direct and the delegated totals
/// are positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyReport {
    pub task_id: String,
    pub direct: u64,
    pub delegated: u64,
    pub tool_name: Option<String>,
    pub complexity: Complexity,
    /// Percent of the direct cost saved.
    pub efficiency_gain: f64,
    /// Direct cost divided by delegated cost.
    pub efficiency_ratio: f64,
    /// Gain weighted by complexity.
    pub normalized_gain: f64,
}

impl EfficiencyReport {
    fn compute(record: &TokenUsageRecord) -> Self {
        let direct = record.direct;
        let delegated = record.delegated.total;
        let (gain, ratio) = if direct > 0 && delegated > 0 {
            (
                (direct as f64 - delegated as f64) / direct as f64 * 100.0,
                direct as f64 / delegated as f64,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            task_id: record.task_id.clone(),
            direct,
            delegated,
            tool_name: record.delegated.tool_name.clone(),
            complexity: record.complexity,
            efficiency_gain: gain,
            efficiency_ratio: ratio,
            normalized_gain: gain * record.complexity.efficiency_weight(),
        }
    }

    /// Check whether both costs were known.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.direct > 0 && self.delegated > 0
    }
}

// =============================================================================
// Aggregate stats
// =============================================================================

/// Totals for one tool across all tasks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTokenTotals {
    /// Attempts recorded for this tool.
    pub attempts: usize,
    /// Tasks where this tool had the cheapest attempt.
    pub selected: usize,
    pub total_tokens: u64,
}

/// Totals for one complexity bucket (completed tasks only).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityTotals {
    pub tasks: usize,
    pub direct: u64,
    pub delegated: u64,
    pub average_gain: f64,
}

/// Aggregate view over every tracked task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_direct: u64,
    pub total_delegated: u64,
    /// Gain over all completed tasks with both costs known.
    pub overall_gain: f64,
    pub average_quality: Option<f64>,
    pub by_tool: BTreeMap<String, ToolTokenTotals>,
    pub by_complexity: BTreeMap<String, ComplexityTotals>,
    pub trend: EfficiencyTrend,
}

// =============================================================================
// Tracker
// =============================================================================

/// Persisted token data.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenData {
    /// Version of the token data schema.
    pub version: u32,
    /// Completed records, oldest first.
    pub history: VecDeque<TokenUsageRecord>,
}

impl TokenData {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            history: VecDeque::new(),
        }
    }
}

/// Per-task token tracker with persisted history.
#[derive(Debug)]
pub struct TokenTracker {
    /// Path to the token_usage.json file.
    usage_file: Option<PathBuf>,
    /// Completed history.
    data: TokenData,
    /// Tasks started but not yet completed.
    active: HashMap<String, TokenUsageRecord>,
    dirty: bool,
}

impl TokenTracker {
    /// Maximum number of completed records kept in history.
    pub const MAX_HISTORY: usize = 1000;

    /// Open the tracker for a project directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the usage file exists but cannot be parsed.
    pub fn open(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let usage_file = Self::usage_path(project_dir.as_ref());
        let data = if usage_file.exists() {
            let file = File::open(&usage_file).context("Failed to open token usage file")?;
            serde_json::from_reader(BufReader::new(file))
                .context("Failed to parse token usage file")?
        } else {
            TokenData::new()
        };
        debug!(records = data.history.len(), "Loaded token history");

        Ok(Self {
            usage_file: Some(usage_file),
            data,
            active: HashMap::new(),
            dirty: false,
        })
    }

    /// Create a tracker that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            usage_file: None,
            data: TokenData::new(),
            active: HashMap::new(),
            dirty: false,
        }
    }

    /// Location of the usage file for a project.
    pub fn usage_path(project_dir: &Path) -> PathBuf {
        project_dir.join(DATA_DIR).join("token_usage.json")
    }

    /// Begin tracking a task.
    ///
    /// # Errors
    ///
    /// Returns [`ConductorError::TaskAlreadyStarted`] if the id is already known.
    pub fn start_task(&mut self, task_id: &str, task_type: TaskType, complexity: Complexity) -> Result<()> {
        if self.record(task_id).is_some() {
            return Err(ConductorError::TaskAlreadyStarted {
                task_id: task_id.to_string(),
            });
        }
        self.active
            .insert(task_id.to_string(), TokenUsageRecord::new(task_id, task_type, complexity));
        debug!(task_id, "Started token tracking");
        Ok(())
    }

    /// Set the direct (unassisted) cost estimate, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns a task-state error if the task is unknown or completed.
    pub fn record_direct_cost(&mut self, task_id: &str, tokens: u64) -> Result<()> {
        let record = self.writable(task_id)?;
        record.direct = tokens;
        Ok(())
    }

    /// Record one tool attempt.
    ///
    /// The per-tool entry is replaced; the task's delegated cost only changes
    /// when this attempt is strictly cheaper than the best so far (or is the
    /// first). Returns `true` when it became the new best.
    ///
    /// # Errors
    ///
    /// Returns a task-state error if the task is unknown or completed.
    pub fn record_delegated_cost(&mut self, task_id: &str, tool: &str, cost: PhaseCost) -> Result<bool> {
        let record = self.writable(task_id)?;
        record.per_tool.insert(tool.to_string(), cost);

        let is_best = record.delegated.tool_name.is_none() || cost.total < record.delegated.total;
        if is_best {
            record.delegated = DelegatedCost {
                analysis: cost.analysis,
                delegation: cost.delegation,
                review: cost.review,
                total: cost.total,
                tool_name: Some(tool.to_string()),
                time_spent_ms: cost.time_spent_ms,
            };
        }
        debug!(task_id, tool, total = cost.total, is_best, "Recorded delegated cost");
        Ok(is_best)
    }

    /// Finalize a task with its quality score.
    ///
    /// # Errors
    ///
    /// Returns a task-state error if the task is unknown or already completed.
    pub fn complete_task(&mut self, task_id: &str, quality_score: Option<f64>) -> Result<TokenUsageRecord> {
        let Some(mut record) = self.active.remove(task_id) else {
            return Err(self.unwritable(task_id));
        };
        let now = Utc::now();
        record.status = TaskStatus::Completed;
        record.quality_score = quality_score;
        record.completed_at = Some(now);
        record.elapsed_ms = Some(
            u64::try_from((now - record.started_at).num_milliseconds()).unwrap_or(0),
        );
        let completed = record;

        if self.data.history.len() >= Self::MAX_HISTORY {
            self.data.history.pop_front();
        }
        self.data.history.push_back(completed.clone());
        self.dirty = true;

        info!(
            task_id,
            direct = completed.direct,
            delegated = completed.delegated.total,
            "Completed token tracking"
        );
        Ok(completed)
    }

    /// Efficiency figures for a task, or `None` if it is unknown.
    #[must_use]
    pub fn compare_efficiency(&self, task_id: &str) -> Option<EfficiencyReport> {
        self.record(task_id).map(TokenUsageRecord::efficiency)
    }

    /// Look up a record, active first, then history.
    #[must_use]
    pub fn record(&self, task_id: &str) -> Option<&TokenUsageRecord> {
        self.active
            .get(task_id)
            .or_else(|| self.data.history.iter().rev().find(|r| r.task_id == task_id))
    }

    /// Completed records, oldest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<TokenUsageRecord> {
        &self.data.history
    }

    /// Aggregate statistics over history plus unfinished tasks.
    #[must_use]
    pub fn get_stats(&self) -> TokenStats {
        let pending = self.active.values();
        let all: Vec<&TokenUsageRecord> = self.data.history.iter().chain(pending).collect();
        let completed: Vec<&TokenUsageRecord> = self.data.history.iter().collect();

        let mut by_tool: BTreeMap<String, ToolTokenTotals> = BTreeMap::new();
        for record in &all {
            for (tool, cost) in &record.per_tool {
                let totals = by_tool.entry(tool.clone()).or_default();
                totals.attempts += 1;
                totals.total_tokens += cost.total;
            }
            if let Some(tool) = &record.delegated.tool_name {
                by_tool.entry(tool.clone()).or_default().selected += 1;
            }
        }

        let mut by_complexity: BTreeMap<String, ComplexityTotals> = BTreeMap::new();
        let mut gain_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for record in &completed {
            let key = record.complexity.as_str().to_string();
            let bucket = by_complexity.entry(key.clone()).or_default();
            bucket.tasks += 1;
            bucket.direct += record.direct;
            bucket.delegated += record.delegated.total;
            let efficiency = record.efficiency();
            if efficiency.is_defined() {
                let sum = gain_sums.entry(key).or_insert((0.0, 0));
                sum.0 += efficiency.efficiency_gain;
                sum.1 += 1;
            }
        }
        for (key, (sum, count)) in gain_sums {
            if let Some(bucket) = by_complexity.get_mut(&key) {
                bucket.average_gain = sum / count as f64;
            }
        }

        let (defined_direct, defined_delegated) = completed
            .iter()
            .filter(|r| r.direct > 0 && r.delegated.total > 0)
            .fold((0u64, 0u64), |(d, g), r| (d + r.direct, g + r.delegated.total));
        let overall_gain = if defined_direct > 0 {
            (defined_direct as f64 - defined_delegated as f64) / defined_direct as f64 * 100.0
        } else {
            0.0
        };

        let scores: Vec<f64> = completed.iter().filter_map(|r| r.quality_score).collect();
        let average_quality = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        TokenStats {
            total_tasks: all.len(),
            completed_tasks: completed.len(),
            total_direct: all.iter().map(|r| r.direct).sum(),
            total_delegated: all.iter().map(|r| r.delegated.total).sum(),
            overall_gain,
            average_quality,
            by_tool,
            by_complexity,
            trend: analyze_efficiency_trend(&completed),
        }
    }

    /// Check if data has been modified since last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save history to disk. In-memory trackers do nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.usage_file else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create .conductor directory")?;
        }
        let file = File::create(path).context("Failed to create token usage file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.data)
            .context("Failed to write token usage file")?;

        self.dirty = false;
        Ok(())
    }

    fn writable(&mut self, task_id: &str) -> Result<&mut TokenUsageRecord> {
        if !self.active.contains_key(task_id) {
            return Err(self.unwritable(task_id));
        }
        self.active
            .get_mut(task_id)
            .ok_or_else(|| ConductorError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Error for a write to a task that is not in flight.
    fn unwritable(&self, task_id: &str) -> ConductorError {
        let task_id = task_id.to_string();
        if self.data.history.iter().any(|r| r.task_id == task_id) {
            ConductorError::TaskAlreadyCompleted { task_id }
        } else {
            ConductorError::TaskNotFound { task_id }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::trends::TrendDirection;
    use tempfile::TempDir;

    fn started(tracker: &mut TokenTracker, id: &str, complexity: Complexity) {
        tracker.start_task(id, TaskType::Ui, complexity).unwrap();
    }

    #[test]
    fn test_login_form_efficiency() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Medium);
        tracker.record_direct_cost("t1", 1200).unwrap();
        tracker
            .record_delegated_cost("t1", "claude", PhaseCost::new(60, 180, 60))
            .unwrap();

        let report = tracker.compare_efficiency("t1").unwrap();
        assert_eq!(report.delegated, 300);
        assert!((report.efficiency_gain - 75.0).abs() < 1e-9);
        assert!((report.efficiency_ratio - 4.0).abs() < 1e-9);
        assert!((report.normalized_gain - 75.0).abs() < 1e-9);
        assert_eq!(report.tool_name.as_deref(), Some("claude"));
    }

    #[test]
    fn test_delegated_keeps_minimum() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Medium);
        assert!(tracker.record_delegated_cost("t1", "a", PhaseCost::from_total(500)).unwrap());
        assert!(tracker.record_delegated_cost("t1", "b", PhaseCost::from_total(300)).unwrap());
        assert!(!tracker.record_delegated_cost("t1", "c", PhaseCost::from_total(400)).unwrap());
        assert!(!tracker.record_delegated_cost("t1", "d", PhaseCost::from_total(300)).unwrap());

        let record = tracker.record("t1").unwrap();
        assert_eq!(record.delegated.total, 300);
        assert_eq!(record.delegated.tool_name.as_deref(), Some("b"));
        assert_eq!(record.per_tool.len(), 4);
    }

    #[test]
    fn test_zero_direct_never_divides() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Low);
        tracker.record_delegated_cost("t1", "a", PhaseCost::from_total(300)).unwrap();

        let report = tracker.compare_efficiency("t1").unwrap();
        assert_eq!(report.efficiency_gain, 0.0);
        assert_eq!(report.efficiency_ratio, 0.0);
        assert!(!report.is_defined());
    }

    #[test]
    fn test_zero_delegated_never_divides() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Low);
        tracker.record_direct_cost("t1", 1000).unwrap();
        let report = tracker.compare_efficiency("t1").unwrap();
        assert_eq!(report.efficiency_ratio, 0.0);
    }

    #[test]
    fn test_normalized_gain_weights() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "hi", Complexity::High);
        tracker.record_direct_cost("hi", 1000).unwrap();
        tracker.record_delegated_cost("hi", "a", PhaseCost::from_total(500)).unwrap();
        let report = tracker.compare_efficiency("hi").unwrap();
        assert!((report.normalized_gain - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_direct_cost_overwrites() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Medium);
        tracker.record_direct_cost("t1", 100).unwrap();
        tracker.record_direct_cost("t1", 900).unwrap();
        assert_eq!(tracker.record("t1").unwrap().direct, 900);
    }

    #[test]
    fn test_state_machine_errors() {
        let mut tracker = TokenTracker::in_memory();
        assert!(matches!(
            tracker.record_direct_cost("missing", 1),
            Err(ConductorError::TaskNotFound { .. })
        ));

        started(&mut tracker, "t1", Complexity::Medium);
        assert!(matches!(
            tracker.start_task("t1", TaskType::Ui, Complexity::Low),
            Err(ConductorError::TaskAlreadyStarted { .. })
        ));

        tracker.complete_task("t1", Some(8.0)).unwrap();
        assert!(matches!(
            tracker.record_direct_cost("t1", 1),
            Err(ConductorError::TaskAlreadyCompleted { .. })
        ));
        assert!(matches!(
            tracker.record_delegated_cost("t1", "a", PhaseCost::from_total(1)),
            Err(ConductorError::TaskAlreadyCompleted { .. })
        ));
        assert!(matches!(
            tracker.complete_task("t1", None),
            Err(ConductorError::TaskAlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_completed_tasks_leave_active_set() {
        let mut tracker = TokenTracker::in_memory();
        for i in 0..6 {
            let id = format!("t{}", i);
            started(&mut tracker, &id, Complexity::Medium);
            tracker.record_direct_cost(&id, 1000).unwrap();
            tracker.complete_task(&id, None).unwrap();
        }
        assert!(tracker.active.is_empty());
        assert_eq!(tracker.history().len(), 6);

        // Completed records are still found and still read-only.
        assert_eq!(tracker.record("t3").unwrap().direct, 1000);
        assert!(matches!(
            tracker.record_direct_cost("t3", 1),
            Err(ConductorError::TaskAlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = TokenTracker::in_memory();
        for i in 0..TokenTracker::MAX_HISTORY + 2 {
            let id = format!("t{}", i);
            started(&mut tracker, &id, Complexity::Low);
            tracker.complete_task(&id, None).unwrap();
        }
        assert_eq!(tracker.history().len(), TokenTracker::MAX_HISTORY);
        assert_eq!(tracker.history().front().unwrap().task_id, "t2");
        assert!(tracker.active.is_empty());
    }

    #[test]
    fn test_trend_skips_tasks_without_delegated_cost() {
        let mut tracker = TokenTracker::in_memory();
        for i in 0..6 {
            let id = format!("t{}", i);
            started(&mut tracker, &id, Complexity::Medium);
            tracker.record_direct_cost(&id, 1000).unwrap();
            if i < 3 {
                tracker.record_delegated_cost(&id, "claude", PhaseCost::from_total(500)).unwrap();
            }
            tracker.complete_task(&id, None).unwrap();
        }

        let stats = tracker.get_stats();
        assert!((stats.overall_gain - 50.0).abs() < 1e-9);
        assert_eq!(stats.trend.direction(), Some(TrendDirection::Stable));
        match stats.trend {
            EfficiencyTrend::Trend { samples, recent_mean, .. } => {
                assert_eq!(samples, 3);
                assert!((recent_mean - 50.0).abs() < 1e-9);
            }
            other => panic!("expected a trend, got {:?}", other),
        }
    }

    #[test]
    fn test_tokens_spent_sums_every_attempt() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Medium);
        tracker.record_delegated_cost("t1", "cheap", PhaseCost::from_total(100)).unwrap();
        tracker.record_delegated_cost("t1", "pricey", PhaseCost::from_total(1000)).unwrap();

        let record = tracker.record("t1").unwrap();
        assert_eq!(record.delegated.total, 100);
        assert_eq!(record.tokens_spent(), 1100);
        assert_eq!(record.tool_tokens("pricey"), 1000);
        assert_eq!(record.tool_tokens("unused"), 0);
    }

    #[test]
    fn test_unknown_task_has_no_report() {
        assert!(TokenTracker::in_memory().compare_efficiency("nope").is_none());
    }

    #[test]
    fn test_stats_buckets_and_tools() {
        let mut tracker = TokenTracker::in_memory();
        for (id, complexity, direct, delegated) in [
            ("a", Complexity::Low, 1000, 250),
            ("b", Complexity::Low, 1000, 750),
            ("c", Complexity::High, 2000, 500),
        ] {
            started(&mut tracker, id, complexity);
            tracker.record_direct_cost(id, direct).unwrap();
            tracker
                .record_delegated_cost(id, "claude", PhaseCost::from_total(delegated))
                .unwrap();
            tracker.complete_task(id, Some(7.0)).unwrap();
        }
        started(&mut tracker, "pending", Complexity::Medium);
        tracker
            .record_delegated_cost("pending", "ui-specialist", PhaseCost::from_total(10))
            .unwrap();

        let stats = tracker.get_stats();
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.completed_tasks, 3);
        assert_eq!(stats.total_direct, 4000);
        assert_eq!(stats.total_delegated, 1510);
        assert!((stats.overall_gain - 62.5).abs() < 1e-9);
        assert_eq!(stats.average_quality, Some(7.0));

        let low = &stats.by_complexity["low"];
        assert_eq!(low.tasks, 2);
        assert!((low.average_gain - 50.0).abs() < 1e-9);
        assert!(!stats.by_complexity.contains_key("medium"));

        assert_eq!(stats.by_tool["claude"].attempts, 3);
        assert_eq!(stats.by_tool["claude"].selected, 3);
        assert_eq!(stats.by_tool["ui-specialist"].total_tokens, 10);
    }

    #[test]
    fn test_stats_trend_needs_three() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "a", Complexity::Low);
        tracker.complete_task("a", None).unwrap();
        let stats = tracker.get_stats();
        assert_eq!(stats.trend, EfficiencyTrend::InsufficientData { completed: 1 });
    }

    #[test]
    fn test_stats_trend_direction() {
        let mut tracker = TokenTracker::in_memory();
        for (i, delegated) in [900u64, 800, 500, 200, 100, 100].iter().enumerate() {
            let id = format!("t{i}");
            started(&mut tracker, &id, Complexity::Medium);
            tracker.record_direct_cost(&id, 1000).unwrap();
            tracker
                .record_delegated_cost(&id, "claude", PhaseCost::from_total(*delegated))
                .unwrap();
            tracker.complete_task(&id, None).unwrap();
        }
        match tracker.get_stats().trend {
            EfficiencyTrend::Trend { direction, .. } => {
                assert_eq!(direction, TrendDirection::Improving);
            }
            other => panic!("unexpected trend: {other:?}"),
        }
    }

    #[test]
    fn test_persistence_roundtrip() {
        let temp = TempDir::new().unwrap();
        {
            let mut tracker = TokenTracker::open(temp.path()).unwrap();
            tracker.start_task("t1", TaskType::Logic, Complexity::High).unwrap();
            tracker.record_direct_cost("t1", 500).unwrap();
            tracker.complete_task("t1", Some(9.0)).unwrap();
            assert!(tracker.is_dirty());
            tracker.save().unwrap();
            assert!(!tracker.is_dirty());
        }

        let mut reopened = TokenTracker::open(temp.path()).unwrap();
        assert_eq!(reopened.history().len(), 1);
        assert_eq!(reopened.record("t1").unwrap().direct, 500);
        assert!(matches!(
            reopened.start_task("t1", TaskType::Ui, Complexity::Low),
            Err(ConductorError::TaskAlreadyStarted { .. })
        ));
        assert!(matches!(
            reopened.record_direct_cost("t1", 1),
            Err(ConductorError::TaskAlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = TokenTracker::usage_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(TokenTracker::open(temp.path()).is_err());
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut tracker = TokenTracker::in_memory();
        started(&mut tracker, "t1", Complexity::Low);
        tracker.complete_task("t1", None).unwrap();
        assert!(tracker.save().is_ok());
    }
}
