//! Tool and execution connectors.
//!
//! Code generation goes through the [`ToolConnector`] trait and execution of
//! the chosen implementation through [`ExecutionConnector`]. Live HTTP
//! clients and the simulated backend implement the same traits, and the
//! factories below pick one set from [`ConductorConfig::backend`], so no
//! caller branches on the backend.
//!
//! - [`selector`] - scores registered tools against a task analysis
//! - [`retry`] - exponential backoff shared by the live clients
//! - [`claude`] - chat-completion API client
//! - [`bolt`] - code-execution service client
//! - [`simulated`] - canned responses with optional latency
//!
//! # Example
//!
//! ```
//! use conductor::config::ConductorConfig;
//! use conductor::tools::create_tool_selector;
//!
//! let config = ConductorConfig::default(); // simulated backend
//! let selector = create_tool_selector(&config).unwrap();
//! assert_eq!(selector.len(), 3);
//! ```

pub mod bolt;
pub mod claude;
pub mod retry;
pub mod selector;
pub mod simulated;

pub use bolt::BoltClient;
pub use claude::AnthropicClient;
pub use retry::{with_retry, RetryPolicy};
pub use selector::{ScoredTool, ToolProfile, ToolSelector};
pub use simulated::{SimulatedExecutionConnector, SimulatedToolConnector};

use crate::config::{Backend, ConductorConfig};
use crate::error::{ConductorError, Result};
use crate::task::{Complexity, Feature, TaskType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

// =============================================================================
// Generation
// =============================================================================

/// Prompt sent to a code-generation tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GenerationRequest {
    /// Create a request with the default limits.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Set the response token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Token counts reported (or estimated) for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Input plus output tokens.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Text produced by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// A code-generation backend.
///
/// Object-safe and `Send + Sync`, so registries hold `Arc<dyn ToolConnector>`.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Tool name used in selection, tracking and reports.
    fn name(&self) -> &str;

    /// Generate text for a prompt.
    ///
    /// # Errors
    ///
    /// Returns an upstream error when the backend fails after retries, or
    /// [`ConductorError::Cancelled`] when the token fires first.
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation>;
}

// =============================================================================
// Execution
// =============================================================================

/// Task metadata forwarded to the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub features: Vec<String>,
}

/// Limits forwarded to the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Seconds.
    pub timeout: u64,
    pub retries: u32,
}

/// Body of an execution call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub task_id: String,
    pub description: String,
    pub implementation: String,
    pub metadata: ExecutionMetadata,
    pub config: ExecutionOptions,
}

/// Reply of the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub result: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A code-execution backend.
#[async_trait]
pub trait ExecutionConnector: Send + Sync {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Execute an implementation.
    ///
    /// # Errors
    ///
    /// Returns an upstream error when the service fails after retries, or
    /// [`ConductorError::Cancelled`] when the token fires first.
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResponse>;
}

// =============================================================================
// Shared HTTP helpers
// =============================================================================

/// Classify a transport failure. Timeouts and connection problems are transient.
pub(crate) fn transport_error(service: &str, err: &reqwest::Error) -> ConductorError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request();
    ConductorError::upstream(service, err.to_string(), retryable)
}

/// Build an HTTP client with the request timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConductorError::config(format!("failed to build HTTP client: {}", e)))
}

/// Read a credential from the environment.
pub(crate) fn credential(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConductorError::MissingCredential {
            env_var: env_var.to_string(),
        }),
    }
}

// =============================================================================
// Factories
// =============================================================================

/// Default profiles for the simulated tools.
#[must_use]
pub fn default_profiles() -> Vec<ToolProfile> {
    vec![
        ToolProfile::new("claude")
            .with_strengths(&[TaskType::Ui, TaskType::Logic, TaskType::Design])
            .with_affinity(&[Feature::Validation, Feature::TypeScript, Feature::AsyncOperations])
            .with_max_complexity(Complexity::High)
            .with_cost_factor(1.0),
        ToolProfile::new("ui-specialist")
            .with_strengths(&[TaskType::Ui, TaskType::Design])
            .with_affinity(&[
                Feature::Accessibility,
                Feature::Animations,
                Feature::ResponsiveDesign,
                Feature::StateManagement,
            ])
            .with_max_complexity(Complexity::Medium)
            .with_cost_factor(0.5),
        ToolProfile::new("logic-specialist")
            .with_strengths(&[TaskType::Logic])
            .with_affinity(&[
                Feature::AsyncOperations,
                Feature::StateManagement,
                Feature::Validation,
                Feature::TypeScript,
            ])
            .with_max_complexity(Complexity::High)
            .with_cost_factor(0.5),
    ]
}

/// Create the tool registry for the configured backend.
///
/// # Errors
///
/// Returns a configuration error if a live client is missing its credential.
pub fn create_tool_selector(config: &ConductorConfig) -> Result<ToolSelector> {
    let mut selector = ToolSelector::new();
    match config.backend {
        Backend::Live => {
            let client = AnthropicClient::from_config(config)?;
            let profile = default_profiles()
                .into_iter()
                .find(|p| p.name == "claude")
                .unwrap_or_else(|| ToolProfile::new("claude"));
            selector.register(profile, Arc::new(client));
        }
        Backend::Simulated => {
            let latency = Duration::from_millis(config.simulated_latency_ms);
            for profile in default_profiles() {
                let connector = SimulatedToolConnector::new(&profile.name).with_latency(latency);
                selector.register(profile, Arc::new(connector));
            }
        }
    }
    info!(backend = %config.backend, tools = selector.len(), "Tool registry ready");
    Ok(selector)
}

/// Create the execution connector for the configured backend.
///
/// # Errors
///
/// Returns a configuration error if a live client is missing its credential.
pub fn create_execution_connector(config: &ConductorConfig) -> Result<Arc<dyn ExecutionConnector>> {
    match config.backend {
        Backend::Live => Ok(Arc::new(BoltClient::from_config(config)?)),
        Backend::Simulated => Ok(Arc::new(
            SimulatedExecutionConnector::new()
                .with_latency(Duration::from_millis(config.simulated_latency_ms)),
        )),
    }
}
