//! Wire shapes for exposing the pipeline as a task service.
//!
//! No server ships with the crate; these types define the JSON contract a
//! front-end would speak:
//!
//! | Endpoint | Request | Response |
//! |----------|---------|----------|
//! | `POST /tasks` | [`TaskSubmission`] | [`TaskAccepted`] |
//! | `GET /tasks/{id}/status` | | [`TaskStatusResponse`] |
//! | `GET /tasks/{id}/implementation` | | [`ImplementationResponse`] |
//!
//! Failures use [`ErrorResponse`], and [`RateLimitPolicy`] lists the per
//! endpoint limits.
//!
//! # Example
//!
//! ```
//! use conductor::api::TaskSubmission;
//! use serde_json::json;
//!
//! let submission = TaskSubmission::from_json(&json!({
//!     "taskId": "t1",
//!     "description": "Create a login form component with validation",
//!     "type": "ui",
//!     "complexity": "medium"
//! }))
//! .unwrap();
//! let task = submission.into_task().unwrap();
//! assert_eq!(task.id, "t1");
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConductorError, Result};
use crate::pipeline::TaskOutcome;
use crate::task::{Analysis, Complexity, Task, TaskType};
use crate::validation::{FieldKind, FieldRule, ObjectSchema};

/// Header carrying a client-supplied idempotency key on submissions.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Estimated lines processed per second, for completion estimates.
const LINES_PER_SECOND: u32 = 10;

/// Lower bound for completion estimates.
const MIN_ESTIMATE_SECS: i64 = 5;

// ============================================================================
// Submission
// ============================================================================

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    pub task_id: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    /// Values may be any JSON; non-strings are stored in their JSON form.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl TaskSubmission {
    fn schema() -> ObjectSchema {
        ObjectSchema::new()
            .field(FieldRule::new("taskId", FieldKind::String).required().min_length(1))
            .field(FieldRule::new("description", FieldKind::String).required().min_length(1))
            .field(FieldRule::new("type", FieldKind::String).one_of(&["ui", "logic", "design", "unknown"]))
            .field(FieldRule::new("complexity", FieldKind::String).one_of(&["low", "medium", "high"]))
            .field(FieldRule::new("template", FieldKind::String).min_length(1))
            .field(FieldRule::new("features", FieldKind::Array).items(FieldKind::String))
            .field(FieldRule::new("context", FieldKind::Object))
    }

    /// Validate and parse a submission, reporting every invalid field.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every offending field.
    pub fn from_json(value: &Value) -> Result<Self> {
        Self::schema()
            .validate(value)
            .map_err(|errors| ConductorError::Validation { errors })?;
        serde_json::from_value(value.clone())
            .map_err(|e| ConductorError::validation("$", e.to_string()))
    }

    /// Convert into a [`Task`].
    ///
    /// # Errors
    ///
    /// Returns a validation error if the resulting task is invalid.
    pub fn into_task(self) -> Result<Task> {
        let mut task = Task::new(self.task_id, self.description)
            .with_type(self.task_type)
            .with_complexity(self.complexity);
        for feature in self.features {
            task = task.with_feature(feature);
        }
        if let Some(template) = self.template {
            task = task.with_template(template);
        }
        for (key, value) in self.context {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            task = task.with_context(key, value);
        }
        task.validate()?;
        Ok(task)
    }
}

/// Body returned when a submission is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAccepted {
    pub task_id: String,
    pub status: TaskState,
    pub estimated_completion: DateTime<Utc>,
}

impl TaskAccepted {
    /// Acknowledge a task, estimating completion from its analysis.
    #[must_use]
    pub fn new(task_id: impl Into<String>, analysis: &Analysis, now: DateTime<Utc>) -> Self {
        let secs = i64::from(analysis.estimated_lines / LINES_PER_SECOND).max(MIN_ESTIMATE_SECS);
        Self {
            task_id: task_id.into(),
            status: TaskState::Pending,
            estimated_completion: now + Duration::seconds(secs),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Externally visible task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Body of `GET /tasks/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_gain: Option<f64>,
    pub tokens_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<&TaskOutcome> for TaskStatusResponse {
    fn from(outcome: &TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Completed(report) => Self {
                task_id: report.task_id.clone(),
                status: TaskState::Completed,
                selected_tool: Some(report.selected_tool.clone()),
                quality_score: (!report.quality.is_failed()).then_some(report.quality.overall_score),
                efficiency_gain: report
                    .efficiency
                    .is_defined()
                    .then_some(report.efficiency.efficiency_gain),
                tokens_spent: report.tokens_spent,
                error: None,
            },
            TaskOutcome::Failed(failure) => Self {
                task_id: failure.task_id.clone(),
                status: TaskState::Failed,
                selected_tool: None,
                quality_score: None,
                efficiency_gain: None,
                tokens_spent: failure.tokens_spent,
                error: Some(ErrorBody {
                    code: failure.code.clone(),
                    message: failure.message.clone(),
                    details: Some(serde_json::json!({ "stage": failure.stage })),
                }),
            },
        }
    }
}

/// Body of `GET /tasks/{id}/implementation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationResponse {
    pub task_id: String,
    pub tool: String,
    pub implementation: String,
    pub quality_score: f64,
}

impl ImplementationResponse {
    /// Implementation of a completed outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ConductorError::TaskNotFound`] if the task did not complete.
    pub fn from_outcome(outcome: &TaskOutcome) -> Result<Self> {
        match outcome {
            TaskOutcome::Completed(report) => Ok(Self {
                task_id: report.task_id.clone(),
                tool: report.selected_tool.clone(),
                implementation: report.implementation.clone(),
                quality_score: report.quality.overall_score,
            }),
            TaskOutcome::Failed(failure) => Err(ConductorError::TaskNotFound {
                task_id: failure.task_id.clone(),
            }),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Envelope for every error reply: `{success: false, error: {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
    /// HTTP status; carried out of band.
    #[serde(skip)]
    pub status: u16,
}

impl ErrorResponse {
    /// Error reply for a rate-limited request.
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: "RATE_LIMITED".to_string(),
                message: "Rate limit exceeded. Please try again later.".to_string(),
                details: Some(serde_json::json!({ "retryAfter": retry_after_secs })),
            },
            status: 429,
        }
    }
}

impl From<&ConductorError> for ErrorResponse {
    fn from(err: &ConductorError) -> Self {
        let details = match err {
            ConductorError::Validation { errors } => serde_json::to_value(errors).ok(),
            ConductorError::Upstream { service, status, .. } => {
                Some(serde_json::json!({ "service": service, "status": status }))
            }
            ConductorError::RetriesExhausted { service, attempts, .. } => {
                Some(serde_json::json!({ "service": service, "attempts": attempts }))
            }
            ConductorError::MissingCredential { env_var } => Some(serde_json::json!({ "envVar": env_var })),
            _ => None,
        };
        Self {
            success: false,
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
                details,
            },
            status: err.http_status(),
        }
    }
}

// ============================================================================
// Rate limits
// ============================================================================

/// Endpoint classes with their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    Submission,
    StatusCheck,
    Retrieval,
}

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub endpoint: Endpoint,
    pub requests: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// The policy table.
    pub const TABLE: [RateLimitPolicy; 3] = [
        RateLimitPolicy {
            endpoint: Endpoint::Submission,
            requests: 60,
            window_secs: 60,
        },
        RateLimitPolicy {
            endpoint: Endpoint::StatusCheck,
            requests: 120,
            window_secs: 60,
        },
        RateLimitPolicy {
            endpoint: Endpoint::Retrieval,
            requests: 30,
            window_secs: 60,
        },
    ];

    /// Policy for an endpoint.
    #[must_use]
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self::TABLE
            .into_iter()
            .find(|p| p.endpoint == endpoint)
            .unwrap_or(Self::TABLE[0])
    }

    /// Seconds until a window that started `elapsed_secs` ago resets.
    #[must_use]
    pub fn retry_after(&self, elapsed_secs: u64) -> u64 {
        self.window_secs.saturating_sub(elapsed_secs).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskAnalyzer;
    use serde_json::json;

    #[test]
    fn test_submission_collects_all_field_errors() {
        let err = TaskSubmission::from_json(&json!({
            "description": "",
            "type": "backend",
            "features": ["ok", 3]
        }))
        .unwrap_err();

        let ConductorError::Validation { errors } = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["taskId", "description", "type", "features[1]"]);
    }

    #[test]
    fn test_submission_into_task() {
        let task = TaskSubmission::from_json(&json!({
            "taskId": "t9",
            "description": "Create a dashboard",
            "type": "ui",
            "complexity": "high",
            "template": "component",
            "features": ["accessibility"],
            "context": {"framework": "Vue", "columns": 3}
        }))
        .unwrap()
        .into_task()
        .unwrap();

        assert_eq!(task.task_type, TaskType::Ui);
        assert_eq!(task.complexity, Complexity::High);
        assert_eq!(task.template.as_deref(), Some("component"));
        assert_eq!(task.context["framework"], "Vue");
        assert_eq!(task.context["columns"], "3");
    }

    #[test]
    fn test_accepted_estimate_has_floor() {
        let task = Task::new("t1", "Make a button");
        let analysis = TaskAnalyzer::new().analyze(&task);
        let now = Utc::now();
        let accepted = TaskAccepted::new("t1", &analysis, now);
        assert!(accepted.estimated_completion >= now + Duration::seconds(MIN_ESTIMATE_SECS));
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("estimatedCompletion").is_some());
    }

    #[test]
    fn test_error_response_shape() {
        let err = ConductorError::validation("description", "must not be empty");
        let response = ErrorResponse::from(&err);
        assert_eq!(response.status, 400);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"][0]["field"], "description");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ConductorError::upstream_status("claude", 401, "no"), 401),
            (ConductorError::upstream_status("claude", 403, "no"), 403),
            (ConductorError::upstream_status("claude", 429, "slow"), 429),
            (ConductorError::upstream_status("claude", 502, "down"), 503),
            (
                ConductorError::TaskNotFound {
                    task_id: "x".into(),
                },
                404,
            ),
            (ConductorError::config("bad"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ErrorResponse::from(&err).status, status, "{err}");
        }
    }

    #[test]
    fn test_rate_limit_table() {
        assert_eq!(RateLimitPolicy::for_endpoint(Endpoint::Submission).requests, 60);
        assert_eq!(RateLimitPolicy::for_endpoint(Endpoint::StatusCheck).requests, 120);
        assert_eq!(RateLimitPolicy::for_endpoint(Endpoint::Retrieval).requests, 30);
        assert_eq!(RateLimitPolicy::TABLE[0].retry_after(45), 15);
        assert_eq!(RateLimitPolicy::TABLE[0].retry_after(90), 1);

        let json = serde_json::to_value(ErrorResponse::rate_limited(15)).unwrap();
        assert_eq!(json["error"]["details"]["retryAfter"], 15);
    }
}
