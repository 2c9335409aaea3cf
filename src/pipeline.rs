//! Task processing pipeline.
//!
//! The [`Orchestrator`] owns every component as injected state and drives a
//! task through analysis, template selection, delegation, execution, token
//! accounting and quality scoring.
//!
//! # Flow
//!
//! ```text
//! Task ─► TaskAnalyzer ─► ToolSelector::rank ─► for each of the top N tools:
//!                                                 TemplateManager ─► ToolConnector
//!                                                 TokenTracker::record_delegated_cost
//!       ─► QualityAnalyzer (+ ImplementationComparator when N > 1)
//!       ─► ExecutionConnector ─► TokenTracker::complete_task
//!       ─► MetricsCollector ─► TaskOutcome
//! ```
//!
//! Validation and task-state errors fail fast with `Err`. Every later
//! failure produces [`TaskOutcome::Failed`], which still carries the tokens
//! spent before the failure.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analytics::{EfficiencyReport, MetricsCollector, PhaseCost, TaskMetrics, TokenTracker};
use crate::config::ConductorConfig;
use crate::error::{ConductorError, Result};
use crate::prompt::TemplateManager;
use crate::quality::{extract_code, ComparisonReport, ImplementationComparator, QualityAnalysis, QualityAnalyzer};
use crate::task::{Analysis, Task, TaskAnalyzer};
use crate::tools::{
    create_execution_connector, create_tool_selector, ExecutionConnector, ExecutionMetadata,
    ExecutionOptions, ExecutionRequest, ExecutionResponse, GenerationRequest, ToolSelector,
};

/// Pipeline stage at which a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Selection,
    Delegation,
    Execution,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selection => write!(f, "selection"),
            Self::Delegation => write!(f, "delegation"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

/// One tool attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAttempt {
    pub tool: String,
    pub template_type: Option<String>,
    /// Tokens spent, zero when the attempt failed.
    pub tokens: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A successfully processed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task_id: String,
    pub analysis: Analysis,
    pub selected_tool: String,
    pub template_type: Option<String>,
    pub implementation: String,
    pub attempts: Vec<ToolAttempt>,
    pub quality: QualityAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
    pub execution: ExecutionResponse,
    pub efficiency: EfficiencyReport,
    /// Delegated tokens spent across every attempt.
    pub tokens_spent: u64,
    pub duration_ms: u64,
}

/// A task that failed after processing began.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub task_id: String,
    pub stage: Stage,
    /// Stable error code, as in API error bodies.
    pub code: String,
    pub message: String,
    pub analysis: Analysis,
    pub attempts: Vec<ToolAttempt>,
    /// Delegated tokens spent across every attempt before the failure.
    pub tokens_spent: u64,
    pub duration_ms: u64,
}

/// Result of [`Orchestrator::process_task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskOutcome {
    Completed(Box<TaskReport>),
    Failed(Box<TaskFailure>),
}

impl TaskOutcome {
    /// Id of the processed task.
    #[must_use]
    pub fn task_id(&self) -> &str {
        match self {
            Self::Completed(report) => &report.task_id,
            Self::Failed(failure) => &failure.task_id,
        }
    }

    /// Check if processing completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Delegated tokens spent across every attempt.
    #[must_use]
    pub fn tokens_spent(&self) -> u64 {
        match self {
            Self::Completed(report) => report.tokens_spent,
            Self::Failed(failure) => failure.tokens_spent,
        }
    }
}

/// Request settings shared by every task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Number of ranked tools tried per task.
    pub tool_attempts: usize,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Seconds, forwarded to the execution service.
    pub execution_timeout: u64,
    pub execution_retries: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ConductorConfig::default())
    }
}

impl From<&ConductorConfig> for PipelineSettings {
    fn from(config: &ConductorConfig) -> Self {
        Self {
            tool_attempts: config.tool_attempts.max(1),
            max_tokens: config.anthropic.max_tokens,
            temperature: config.anthropic.temperature,
            execution_timeout: config.execution.timeout_secs,
            execution_retries: config.execution.retries,
        }
    }
}

/// Implementation produced by one successful attempt.
struct Candidate {
    tool: String,
    template_type: Option<String>,
    text: String,
    analysis: QualityAnalysis,
}

/// Drives tasks through the pipeline.
pub struct Orchestrator {
    analyzer: TaskAnalyzer,
    templates: TemplateManager,
    tools: ToolSelector,
    execution: Arc<dyn ExecutionConnector>,
    comparator: ImplementationComparator,
    tracker: Mutex<TokenTracker>,
    metrics: Mutex<MetricsCollector>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tools", &self.tools)
            .field("execution", &self.execution.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts.
    ///
    /// Trackers start in memory and templates are the built-ins for every
    /// registered tool.
    #[must_use]
    pub fn new(tools: ToolSelector, execution: Arc<dyn ExecutionConnector>) -> Self {
        let names: Vec<String> = tools.profiles().map(|p| p.name.clone()).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        Self {
            analyzer: TaskAnalyzer::new(),
            templates: TemplateManager::with_defaults(&names),
            tools,
            execution,
            comparator: ImplementationComparator::default(),
            tracker: Mutex::new(TokenTracker::in_memory()),
            metrics: Mutex::new(MetricsCollector::in_memory()),
            settings: PipelineSettings::default(),
        }
    }

    /// Build an orchestrator for a project from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a live backend lacks credentials, or
    /// an error if persisted state or template files cannot be loaded.
    pub fn from_config(config: &ConductorConfig, project_dir: &Path) -> Result<Self> {
        config.validate()?;
        let tools = create_tool_selector(config)?;
        let execution = create_execution_connector(config)?;

        let mut orchestrator = Self::new(tools, execution)
            .with_analyzer(TaskAnalyzer::new().with_fallback_type(config.analyzer.fallback_type))
            .with_quality_analyzer(QualityAnalyzer::from_mode(config.scoring))
            .with_tracker(TokenTracker::open(project_dir)?)
            .with_metrics(MetricsCollector::open(project_dir)?)
            .with_settings(PipelineSettings::from(config));

        if let Some(dir) = config.templates_path(project_dir) {
            if dir.is_dir() {
                let loaded = orchestrator.templates.load_from_dir(&dir)?;
                debug!(dir = %dir.display(), loaded, "Loaded template files");
            }
        }
        Ok(orchestrator)
    }

    /// Replace the task analyzer.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: TaskAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the template registry.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateManager) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the quality analyzer.
    #[must_use]
    pub fn with_quality_analyzer(mut self, analyzer: QualityAnalyzer) -> Self {
        self.comparator = ImplementationComparator::new(analyzer);
        self
    }

    /// Replace the token tracker.
    #[must_use]
    pub fn with_tracker(mut self, tracker: TokenTracker) -> Self {
        self.tracker = Mutex::new(tracker);
        self
    }

    /// Replace the metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Mutex::new(metrics);
        self
    }

    /// Replace the request settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = PipelineSettings {
            tool_attempts: settings.tool_attempts.max(1),
            ..settings
        };
        self
    }

    /// The task analyzer.
    #[must_use]
    pub fn analyzer(&self) -> &TaskAnalyzer {
        &self.analyzer
    }

    /// The template registry.
    #[must_use]
    pub fn templates(&self) -> &TemplateManager {
        &self.templates
    }

    /// The tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolSelector {
        &self.tools
    }

    /// The token tracker.
    pub fn tracker(&self) -> &Mutex<TokenTracker> {
        &self.tracker
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &Mutex<MetricsCollector> {
        &self.metrics
    }

    /// Persist tracker history and metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub async fn save(&self) -> anyhow::Result<()> {
        self.tracker.lock().await.save()?;
        self.metrics.lock().await.save()?;
        Ok(())
    }

    /// Process a task end to end.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed task and a task-state error
    /// if the id was already used. Later failures are reported as
    /// [`TaskOutcome::Failed`].
    pub async fn process_task(&self, task: Task, cancel: &CancellationToken) -> Result<TaskOutcome> {
        task.validate()?;
        let started = Instant::now();
        let analysis = self.analyzer.analyze(&task);
        info!(
            task_id = %task.id,
            task_type = %analysis.task_type,
            complexity = %analysis.complexity,
            features = ?analysis.features,
            "Analyzed task"
        );

        {
            let mut tracker = self.tracker.lock().await;
            tracker.start_task(&task.id, analysis.task_type, analysis.complexity)?;
            tracker.record_direct_cost(&task.id, analysis.token_budget.total)?;
        }

        let ranked = self.tools.rank(&analysis);
        if ranked.is_empty() {
            let err = ConductorError::config("no tools registered");
            return self.fail(&task, analysis, Stage::Selection, &err, Vec::new(), started).await;
        }

        let mut attempts = Vec::new();
        let mut candidates = Vec::new();
        let mut last_error = None;
        for scored in ranked.iter().take(self.settings.tool_attempts) {
            match self.attempt(&task, &scored.name, cancel).await {
                Ok((attempt, candidate)) => {
                    attempts.push(attempt);
                    candidates.push(candidate);
                }
                Err((attempt, err)) => {
                    warn!(task_id = %task.id, tool = %scored.name, error = %err, "Tool attempt failed");
                    attempts.push(attempt);
                    let cancelled = matches!(err, ConductorError::Cancelled { .. });
                    last_error = Some(err);
                    if cancelled {
                        break;
                    }
                }
            }
        }

        if candidates.is_empty() || cancel.is_cancelled() {
            let err = last_error.unwrap_or_else(|| ConductorError::cancelled("delegation"));
            return self.fail(&task, analysis, Stage::Delegation, &err, attempts, started).await;
        }

        let (best, comparison) = match self.choose(candidates, &task) {
            Ok(chosen) => chosen,
            Err(err) => return self.fail(&task, analysis, Stage::Delegation, &err, attempts, started).await,
        };
        info!(task_id = %task.id, tool = %best.tool, score = best.analysis.overall_score, "Selected implementation");

        let code = extract_code(&best.text).unwrap_or_else(|_| best.text.clone());
        let request = ExecutionRequest {
            task_id: task.id.clone(),
            description: task.description.clone(),
            implementation: code,
            metadata: ExecutionMetadata {
                task_type: analysis.task_type,
                complexity: analysis.complexity,
                features: analysis.features.clone(),
            },
            config: ExecutionOptions {
                timeout: self.settings.execution_timeout,
                retries: self.settings.execution_retries,
            },
        };
        let execution = match self.execution.execute(&request, cancel).await {
            Ok(response) => response,
            Err(err) => return self.fail(&task, analysis, Stage::Execution, &err, attempts, started).await,
        };

        let quality_score = (!best.analysis.is_failed()).then_some(best.analysis.overall_score);
        let record = self.tracker.lock().await.complete_task(&task.id, quality_score)?;
        let efficiency = record.efficiency();
        let duration_ms = elapsed_ms(started);

        self.metrics.lock().await.record_task_metrics(
            &task,
            &TaskMetrics {
                task_type: analysis.task_type,
                complexity: analysis.complexity,
                tool: Some(best.tool.clone()),
                tool_tokens: record.tool_tokens(&best.tool),
                tokens_used: record.tokens_spent(),
                direct_estimate: record.direct,
                quality_score,
                success: true,
                duration_ms,
            },
        );

        info!(
            task_id = %task.id,
            gain = efficiency.efficiency_gain,
            duration_ms,
            "Task completed"
        );
        Ok(TaskOutcome::Completed(Box::new(TaskReport {
            task_id: task.id.clone(),
            analysis,
            selected_tool: best.tool,
            template_type: best.template_type,
            implementation: best.text,
            attempts,
            quality: best.analysis,
            comparison,
            execution,
            efficiency,
            tokens_spent: record.tokens_spent(),
            duration_ms,
        })))
    }

    /// Prompt one tool and record its cost.
    async fn attempt(
        &self,
        task: &Task,
        tool: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(ToolAttempt, Candidate), (ToolAttempt, ConductorError)> {
        let started = Instant::now();
        let template_type = self.templates.get_best_template_type(tool, task);
        let mut attempt = ToolAttempt {
            tool: tool.to_string(),
            template_type: template_type.clone(),
            tokens: 0,
            duration_ms: 0,
            error: None,
        };

        let Some(connector) = self.tools.connector(tool) else {
            let err = ConductorError::config(format!("no connector registered for tool '{}'", tool));
            attempt.error = Some(err.to_string());
            return Err((attempt, err));
        };

        let prompt = template_type
            .as_deref()
            .and_then(|t| self.templates.get_template(tool, t, task))
            .unwrap_or_else(|| task.description.clone());
        let request = GenerationRequest::new(prompt)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        debug!(task_id = %task.id, tool, template = ?template_type, "Delegating task");

        let generation = match connector.generate(&request, cancel).await {
            Ok(generation) => generation,
            Err(err) => {
                attempt.duration_ms = elapsed_ms(started);
                attempt.error = Some(err.to_string());
                return Err((attempt, err));
            }
        };

        attempt.duration_ms = elapsed_ms(started);
        attempt.tokens = generation.usage.total();
        let cost = PhaseCost::new(generation.usage.input_tokens, generation.usage.output_tokens, 0)
            .with_time_spent(attempt.duration_ms);
        if let Err(err) = self.tracker.lock().await.record_delegated_cost(&task.id, tool, cost) {
            attempt.error = Some(err.to_string());
            return Err((attempt, err));
        }

        let analysis = self.comparator.analyzer().analyze_quality(&generation.text, task);
        Ok((
            attempt,
            Candidate {
                tool: tool.to_string(),
                template_type,
                text: generation.text,
                analysis,
            },
        ))
    }

    /// Pick the best candidate, comparing when there are several.
    fn choose(
        &self,
        mut candidates: Vec<Candidate>,
        task: &Task,
    ) -> Result<(Candidate, Option<ComparisonReport>)> {
        if candidates.len() == 1 {
            return Ok((candidates.remove(0), None));
        }

        let analyses = candidates
            .iter()
            .map(|c| (c.tool.clone(), c.analysis.clone()))
            .collect();
        let report = self.comparator.compare_analyses(analyses, task)?;
        let index = candidates
            .iter()
            .position(|c| c.tool == report.findings.best_tool)
            .unwrap_or(0);
        Ok((candidates.swap_remove(index), Some(report)))
    }

    /// Close out a failed task and build its outcome.
    async fn fail(
        &self,
        task: &Task,
        analysis: Analysis,
        stage: Stage,
        err: &ConductorError,
        attempts: Vec<ToolAttempt>,
        started: Instant,
    ) -> Result<TaskOutcome> {
        warn!(task_id = %task.id, %stage, error = %err, "Task failed");
        let duration_ms = elapsed_ms(started);

        let record = self.tracker.lock().await.complete_task(&task.id, None)?;
        self.metrics.lock().await.record_task_metrics(
            task,
            &TaskMetrics {
                task_type: analysis.task_type,
                complexity: analysis.complexity,
                tool: record.delegated.tool_name.clone(),
                tool_tokens: record
                    .delegated
                    .tool_name
                    .as_deref()
                    .map_or(0, |tool| record.tool_tokens(tool)),
                tokens_used: record.tokens_spent(),
                direct_estimate: record.direct,
                quality_score: None,
                success: false,
                duration_ms,
            },
        );

        Ok(TaskOutcome::Failed(Box::new(TaskFailure {
            task_id: task.id.clone(),
            stage,
            code: err.code().to_string(),
            message: err.to_string(),
            analysis,
            attempts,
            tokens_spent: record.tokens_spent(),
            duration_ms,
        })))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
