//! Controllable test doubles for the connector and scoring seams.
//!
//! These mocks let pipeline tests run deterministically without network
//! access or artificial latency.

use crate::error::{ConductorError, Result};
use crate::quality::{MetricScores, QualityMetric, RawScore, ScoringStrategy};
use crate::task::Task;
use crate::tools::{
    ExecutionConnector, ExecutionRequest, ExecutionResponse, Generation, GenerationRequest,
    TokenUsage, ToolConnector,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Decide whether call number `call` (1-based) should fail.
fn scripted_failure(
    service: &str,
    call: u32,
    fail_count: u32,
    error: Option<&str>,
) -> Option<ConductorError> {
    if let Some(message) = error {
        return Some(ConductorError::upstream(service, message, false));
    }
    if call <= fail_count {
        return Some(ConductorError::upstream_status(service, 503, "service unavailable"));
    }
    None
}

// ============================================================================
// Mock Tool Connector
// ============================================================================

/// Mock code-generation tool.
///
/// # Example
///
/// ```
/// use conductor::testing::MockToolConnector;
///
/// let tool = MockToolConnector::new("claude")
///     .with_response("```ts\nexport const x = 1;\n```")
///     .with_usage(100, 200)
///     .with_fail_count(1);
/// assert_eq!(tool.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockToolConnector {
    name: String,
    response: String,
    usage: TokenUsage,
    fail_count: u32,
    error: Option<String>,
    call_count: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockToolConnector {
    /// Create a mock that answers with a small fenced component.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: "```tsx\nexport const Component = () => null;\n```".to_string(),
            usage: TokenUsage {
                input_tokens: 50,
                output_tokens: 250,
            },
            fail_count: 0,
            error: None,
            call_count: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Set the generated text.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Set the reported token usage.
    #[must_use]
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = TokenUsage {
            input_tokens,
            output_tokens,
        };
        self
    }

    /// Fail the first `count` calls with a retryable 503.
    #[must_use]
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = count;
        self
    }

    /// Fail every call with a non-retryable error.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolConnector for MockToolConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation> {
        if cancel.is_cancelled() {
            return Err(ConductorError::cancelled(format!("{} generation", self.name)));
        }
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        if let Some(err) = scripted_failure(&self.name, call, self.fail_count, self.error.as_deref()) {
            return Err(err);
        }
        Ok(Generation {
            text: self.response.clone(),
            usage: self.usage,
            model: format!("mock-{}", self.name),
        })
    }
}

// ============================================================================
// Mock Execution Connector
// ============================================================================

/// Mock execution service.
#[derive(Debug)]
pub struct MockExecutionConnector {
    result: serde_json::Value,
    fail_count: u32,
    error: Option<String>,
    call_count: AtomicU32,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl Default for MockExecutionConnector {
    fn default() -> Self {
        Self {
            result: serde_json::json!({ "status": "success" }),
            fail_count: 0,
            error: None,
            call_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockExecutionConnector {
    /// Create a mock that reports success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the returned result payload.
    #[must_use]
    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = result;
        self
    }

    /// Fail the first `count` calls with a retryable 503.
    #[must_use]
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = count;
        self
    }

    /// Fail every call with a non-retryable error.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionConnector for MockExecutionConnector {
    fn name(&self) -> &str {
        "mock-execution"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResponse> {
        if cancel.is_cancelled() {
            return Err(ConductorError::cancelled("execution"));
        }
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(err) = scripted_failure(self.name(), call, self.fail_count, self.error.as_deref()) {
            return Err(err);
        }
        Ok(ExecutionResponse {
            result: self.result.clone(),
            metadata: serde_json::json!({ "taskId": request.task_id }),
        })
    }
}

// ============================================================================
// Scripted Scoring
// ============================================================================

/// Scoring strategy driven by `key: value` lines in the code.
///
/// `score: N` sets every metric to `N`; a metric key such as
/// `accessibility: 4` overrides that metric. Unscripted metrics score 5.
///
/// ```
/// use conductor::quality::QualityAnalyzer;
/// use conductor::task::Task;
/// use conductor::testing::ScriptedScoring;
///
/// let analyzer = QualityAnalyzer::new(ScriptedScoring);
/// let analysis = analyzer.analyze_quality("score: 8.5", &Task::new("t", "x"));
/// assert_eq!(analysis.overall_score, 8.5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedScoring;

impl ScoringStrategy for ScriptedScoring {
    fn name(&self) -> &str {
        "scripted"
    }

    fn score(&self, code: &str, _implementation: &str, _task: &Task) -> Result<MetricScores> {
        let mut base = 5.0;
        let mut overrides = Vec::new();
        for line in code.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<f64>() else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("score") {
                base = value;
            } else if let Some(metric) = QualityMetric::from_key(key) {
                overrides.push((metric, value));
            }
        }

        let mut scores: MetricScores = QualityMetric::ALL
            .into_iter()
            .map(|m| (m, RawScore::new(base)))
            .collect();
        for (metric, value) in overrides {
            scores.insert(metric, RawScore::new(value).with_weakness(format!("scripted {}", metric)));
        }
        Ok(scores)
    }
}
