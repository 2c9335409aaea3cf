//! Custom error types for conductor.
//!
//! The taxonomy mirrors how failures propagate through the pipeline:
//! validation and configuration errors fail fast, upstream errors are
//! retried and then bubble up, and analysis errors are recovered locally
//! by the quality analyzer.

use crate::validation::FieldError;
use thiserror::Error;

/// Main error type for conductor operations
#[derive(Error, Debug)]
pub enum ConductorError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Malformed task, template or config input
    #[error("Validation failed: {}", summarize(.errors))]
    Validation { errors: Vec<FieldError> },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or unusable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Required credential missing from the environment
    #[error("Missing credential: environment variable {env_var} is not set")]
    MissingCredential { env_var: String },

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    /// A call to an external tool or execution service failed
    #[error("{service} request failed: {message}")]
    Upstream {
        service: String,
        message: String,
        status: Option<u16>,
        retryable: bool,
    },

    /// Retries exhausted for an upstream call
    #[error("{service} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        service: String,
        attempts: u32,
        last_error: String,
    },

    /// Operation aborted through its cancellation token
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    // =========================================================================
    // Analysis Errors
    // =========================================================================
    /// Quality scoring failed (recovered by the quality analyzer)
    #[error("Analysis error: {message}")]
    Analysis { message: String },

    // =========================================================================
    // Task State Errors
    // =========================================================================
    /// No record exists for the task
    #[error("Unknown task: {task_id}")]
    TaskNotFound { task_id: String },

    /// Task was already started
    #[error("Task already started: {task_id}")]
    TaskAlreadyStarted { task_id: String },

    /// Task is completed and no longer accepts writes
    #[error("Task already completed: {task_id}")]
    TaskAlreadyCompleted { task_id: String },

    /// No template registered for the key
    #[error("No template '{template_type}' registered for tool '{tool}'")]
    TemplateNotFound { tool: String, template_type: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConductorError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a validation error for a single field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(service: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
            status: None,
            retryable,
        }
    }

    /// Create an upstream error from an HTTP status.
    ///
    /// 429 and 5xx are considered transient.
    pub fn upstream_status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: format!("HTTP {}: {}", status, body.into()),
            status: Some(status),
            retryable: status == 429 || status >= 500,
        }
    }

    /// Create an analysis error
    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if a retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { retryable: true, .. })
    }

    /// Check if this error should abort processing immediately
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::MissingCredential { .. } | Self::Validation { .. }
        )
    }

    /// Stable machine-readable error code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Configuration { .. } | Self::MissingCredential { .. } => "CONFIGURATION_ERROR",
            Self::Upstream {
                status: Some(401), ..
            } => "UNAUTHORIZED",
            Self::Upstream {
                status: Some(403), ..
            } => "FORBIDDEN",
            Self::Upstream {
                status: Some(429), ..
            } => "RATE_LIMITED",
            Self::Upstream { .. } | Self::RetriesExhausted { .. } => "UPSTREAM_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Analysis { .. } => "ANALYSIS_ERROR",
            Self::TaskNotFound { .. } | Self::TemplateNotFound { .. } => "NOT_FOUND",
            Self::TaskAlreadyStarted { .. } | Self::TaskAlreadyCompleted { .. } => {
                "INVALID_TASK_STATE"
            }
            Self::Io(_) | Self::Json(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status used when this error is returned through the task API
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::TaskAlreadyStarted { .. }
            | Self::TaskAlreadyCompleted { .. } => 400,
            Self::Upstream {
                status: Some(s @ (401 | 403 | 429)),
                ..
            } => *s,
            Self::TaskNotFound { .. } | Self::TemplateNotFound { .. } => 404,
            Self::Upstream { .. } | Self::RetriesExhausted { .. } | Self::Cancelled { .. } => 503,
            _ => 500,
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::Upstream { .. } | Self::RetriesExhausted { .. } => 3,
            Self::Cancelled { .. } => 4,
            Self::Configuration { .. } | Self::MissingCredential { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for conductor results
pub type Result<T> = std::result::Result<T, ConductorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_fields() {
        let err = ConductorError::Validation {
            errors: vec![
                FieldError::new("description", "is required"),
                FieldError::new("type", "must be one of ui, logic, design, unknown"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("description: is required"));
        assert!(text.contains("type: must be one of"));
    }

    #[test]
    fn test_upstream_status_retryable() {
        assert!(ConductorError::upstream_status("anthropic", 429, "slow down").is_retryable());
        assert!(ConductorError::upstream_status("anthropic", 503, "").is_retryable());
        assert!(!ConductorError::upstream_status("anthropic", 400, "bad").is_retryable());
        assert!(!ConductorError::upstream_status("anthropic", 401, "key").is_retryable());
    }

    #[test]
    fn test_is_fatal() {
        assert!(ConductorError::config("missing").is_fatal());
        assert!(ConductorError::MissingCredential {
            env_var: "ANTHROPIC_API_KEY".into()
        }
        .is_fatal());
        assert!(!ConductorError::upstream("bolt", "timeout", true).is_fatal());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ConductorError::validation("id", "empty").http_status(), 400);
        assert_eq!(
            ConductorError::TaskNotFound {
                task_id: "t1".into()
            }
            .http_status(),
            404
        );
        assert_eq!(
            ConductorError::upstream_status("anthropic", 429, "").http_status(),
            429
        );
        assert_eq!(
            ConductorError::upstream_status("anthropic", 401, "").http_status(),
            401
        );
        assert_eq!(
            ConductorError::upstream_status("anthropic", 502, "").http_status(),
            503
        );
        assert_eq!(ConductorError::config("x").http_status(), 500);
    }

    #[test]
    fn test_codes() {
        assert_eq!(ConductorError::validation("a", "b").code(), "VALIDATION_ERROR");
        assert_eq!(
            ConductorError::upstream_status("x", 429, "").code(),
            "RATE_LIMITED"
        );
        assert_eq!(ConductorError::cancelled("generate").code(), "CANCELLED");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConductorError::validation("a", "b").exit_code(), 2);
        assert_eq!(ConductorError::config("x").exit_code(), 7);
        assert_eq!(ConductorError::analysis("x").exit_code(), 1);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: ConductorError = io_err.into();
        assert!(matches!(err, ConductorError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
