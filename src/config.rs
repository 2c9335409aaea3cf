//! Configuration management for conductor.
//!
//! Settings are read from `<project>/.conductor/settings.json`, falling back
//! to the user-level `<config dir>/conductor/settings.json`, then defaults.
//! Every field has a serde default so partial files are fine.
//!
//! # Example settings.json
//!
//! ```json
//! {
//!   "backend": "live",
//!   "anthropic": { "model": "claude-sonnet-4-20250514", "maxTokens": 4096 },
//!   "execution": { "baseUrl": "http://localhost:5173" },
//!   "retry": { "maxAttempts": 3 },
//!   "toolAttempts": 2
//! }
//! ```

use crate::error::{ConductorError, Result};
use crate::task::TaskType;
use crate::validation::{check_range, is_identifier, FieldError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the configured backend.
pub const BACKEND_ENV_VAR: &str = "CONDUCTOR_BACKEND";

/// Project-local state directory.
pub const DATA_DIR: &str = ".conductor";

// =============================================================================
// Backend selection
// =============================================================================

/// Which tool and execution backends to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real HTTP clients; requires credentials.
    Live,
    /// Canned responses with optional artificial latency.
    #[default]
    Simulated,
}

impl std::str::FromStr for Backend {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "simulated" | "sim" | "dev" => Ok(Self::Simulated),
            other => Err(ConductorError::validation(
                "backend",
                format!("unknown backend '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Quality scoring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Constant stand-in scores.
    Fixed,
    /// Text-signal heuristics.
    #[default]
    Heuristic,
}

// =============================================================================
// Sections
// =============================================================================

/// Chat-completion API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.7
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key_env: default_anthropic_key_env(),
        }
    }
}

/// Code-execution service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    #[serde(default = "default_execution_url")]
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_execution_key_env")]
    pub api_key_env: String,
    /// Timeout forwarded to the service in the request body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry count forwarded to the service in the request body.
    #[serde(default = "default_execution_retries")]
    pub retries: u32,
}

fn default_execution_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_endpoint() -> String {
    "/api/execute".to_string()
}

fn default_execution_key_env() -> String {
    "BOLT_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_execution_retries() -> u32 {
    5
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            base_url: default_execution_url(),
            endpoint: default_endpoint(),
            api_key_env: default_execution_key_env(),
            timeout_secs: default_timeout_secs(),
            retries: default_execution_retries(),
        }
    }
}

impl ExecutionConfig {
    /// Full URL of the execution endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint)
    }
}

/// Backoff policy for upstream calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Task analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Type assigned when neither keywords nor the declared type decide.
    #[serde(default = "default_fallback_type")]
    pub fallback_type: TaskType,
}

fn default_fallback_type() -> TaskType {
    TaskType::Ui
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fallback_type: default_fallback_type(),
        }
    }
}

// =============================================================================
// Root config
// =============================================================================

/// Conductor configuration loaded from `.conductor/settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConductorConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub scoring: ScoringMode,
    /// Number of ranked tools tried per task.
    #[serde(default = "default_tool_attempts")]
    pub tool_attempts: usize,
    /// Artificial delay of the simulated backend.
    #[serde(default)]
    pub simulated_latency_ms: u64,
    /// Extra template JSON files, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

fn default_tool_attempts() -> usize {
    1
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            anthropic: AnthropicConfig::default(),
            execution: ExecutionConfig::default(),
            retry: RetryConfig::default(),
            request_timeout_secs: default_timeout_secs(),
            analyzer: AnalyzerConfig::default(),
            scoring: ScoringMode::default(),
            tool_attempts: default_tool_attempts(),
            simulated_latency_ms: 0,
            templates_dir: None,
        }
    }
}

impl ConductorConfig {
    /// Load configuration for a project.
    ///
    /// Reads the project settings file if present, otherwise the user-level
    /// file, otherwise defaults. The `CONDUCTOR_BACKEND` environment variable
    /// is applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed,
    /// or if `CONDUCTOR_BACKEND` holds an unknown value.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let candidates = [
            Some(Self::settings_path(project_dir)),
            Self::user_settings_path(),
        ];

        let mut config = match candidates.into_iter().flatten().find(|p| p.exists()) {
            Some(path) => {
                debug!(path = %path.display(), "Loading settings");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ConductorError::config(format!("invalid settings in {}: {}", path.display(), e))
        })
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown backend name.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BACKEND_ENV_VAR) {
            self.backend = value.parse()?;
            debug!(backend = %self.backend, "Backend overridden from environment");
        }
        Ok(())
    }

    /// Get the settings.json path for a project
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(DATA_DIR).join("settings.json")
    }

    /// Get the user-level settings path, if a config directory exists
    pub fn user_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("conductor").join("settings.json"))
    }

    /// Get the project state directory
    pub fn data_dir(project_dir: &Path) -> PathBuf {
        project_dir.join(DATA_DIR)
    }

    /// Resolve the extra templates directory against the project.
    #[must_use]
    pub fn templates_path(&self, project_dir: &Path) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                project_dir.join(dir)
            }
        })
    }

    /// Per-request timeout for upstream calls.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check every field and report all problems at once.
    ///
    /// Missing API keys are not checked here; live clients report them when
    /// constructed.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !is_http_url(&self.anthropic.base_url) {
            errors.push(FieldError::new("anthropic.baseUrl", "must be an http(s) URL"));
        }
        if self.anthropic.model.trim().is_empty() {
            errors.push(FieldError::new("anthropic.model", "must not be empty"));
        }
        if self.anthropic.max_tokens == 0 {
            errors.push(FieldError::new("anthropic.maxTokens", "must be positive"));
        }
        check_range(
            "anthropic.temperature",
            self.anthropic.temperature,
            0.0,
            1.0,
            &mut errors,
        );
        if !is_env_var_name(&self.anthropic.api_key_env) {
            errors.push(FieldError::new(
                "anthropic.apiKeyEnv",
                "must be an environment variable name",
            ));
        }

        if !is_http_url(&self.execution.base_url) {
            errors.push(FieldError::new("execution.baseUrl", "must be an http(s) URL"));
        }
        if !self.execution.endpoint.starts_with('/') {
            errors.push(FieldError::new("execution.endpoint", "must start with '/'"));
        }
        if !is_env_var_name(&self.execution.api_key_env) {
            errors.push(FieldError::new(
                "execution.apiKeyEnv",
                "must be an environment variable name",
            ));
        }
        if self.execution.timeout_secs == 0 {
            errors.push(FieldError::new("execution.timeoutSecs", "must be positive"));
        }

        if self.retry.max_attempts == 0 {
            errors.push(FieldError::new("retry.maxAttempts", "must be at least 1"));
        }
        if self.retry.multiplier == 0 {
            errors.push(FieldError::new("retry.multiplier", "must be at least 1"));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            errors.push(FieldError::new(
                "retry.initialDelayMs",
                "must not exceed retry.maxDelayMs",
            ));
        }

        if self.request_timeout_secs == 0 {
            errors.push(FieldError::new("requestTimeoutSecs", "must be positive"));
        }
        if self.tool_attempts == 0 {
            errors.push(FieldError::new("toolAttempts", "must be at least 1"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::Validation { errors })
        }
    }
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}

fn is_env_var_name(value: &str) -> bool {
    is_identifier(value) && !value.contains('-')
}
