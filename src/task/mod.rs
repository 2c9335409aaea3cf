//! Task model and task analysis.
//!
//! - [`Task`] - a unit of work as submitted by the caller
//! - [`analyzer`] - derives type, complexity, features and token budget
//!
//! # Example
//!
//! ```
//! use conductor::task::{Complexity, Task, TaskType};
//!
//! let task = Task::new("t1", "Create a login form component with validation")
//!     .with_type(TaskType::Ui)
//!     .with_complexity(Complexity::Medium);
//!
//! assert!(task.validate().is_ok());
//! assert_eq!(task.fields()["type"], "ui");
//! ```

pub mod analyzer;

pub use analyzer::{Analysis, Feature, TaskAnalyzer, TokenBudget};

use crate::error::{ConductorError, Result};
use crate::validation::{require_non_empty, FieldError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Category of work a task describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Ui,
    Logic,
    Design,
    #[default]
    Unknown,
}

impl TaskType {
    /// All task types in declaration order.
    pub const ALL: [TaskType; 4] = [Self::Ui, Self::Logic, Self::Design, Self::Unknown];

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Logic => "logic",
            Self::Design => "design",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ui" => Ok(Self::Ui),
            "logic" => Ok(Self::Logic),
            "design" => Ok(Self::Design),
            "unknown" => Ok(Self::Unknown),
            other => Err(ConductorError::validation(
                "type",
                format!("unknown task type '{}'", other),
            )),
        }
    }
}

/// Declared or derived task complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    /// All complexity levels, lowest first.
    pub const ALL: [Complexity; 3] = [Self::Low, Self::Medium, Self::High];

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Multiplier applied to the base line estimate.
    #[must_use]
    pub fn line_multiplier(&self) -> f64 {
        match self {
            Self::Low => 0.7,
            Self::Medium => 1.0,
            Self::High => 1.5,
        }
    }

    /// Weight used for complexity-normalized efficiency.
    #[must_use]
    pub fn efficiency_weight(&self) -> f64 {
        match self {
            Self::Low => 0.8,
            Self::Medium => 1.0,
            Self::High => 1.2,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ConductorError::validation(
                "complexity",
                format!("unknown complexity '{}'", other),
            )),
        }
    }
}

/// A unit of work described in natural language.
///
/// Tasks are immutable once submitted; the builder methods are meant for
/// construction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub complexity: Complexity,
    /// Declared features, duplicates removed, insertion order kept.
    #[serde(default)]
    pub features: Vec<String>,
    /// Preferred template type, if the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Free-form values available to template placeholders.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Task {
    /// Create a task with unknown type and medium complexity.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            task_type: TaskType::Unknown,
            complexity: Complexity::Medium,
            features: Vec::new(),
            template: None,
            context: BTreeMap::new(),
        }
    }

    /// Set the declared type.
    #[must_use]
    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Set the declared complexity.
    #[must_use]
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Add a declared feature (ignored if already present).
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        let feature = feature.into();
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
        self
    }

    /// Set the preferred template type.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Add a context value for template placeholders.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Check the task before any processing.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        require_non_empty("id", &self.id, &mut errors);
        if self.id.chars().any(char::is_whitespace) {
            errors.push(FieldError::new("id", "must not contain whitespace"));
        }
        require_non_empty("description", &self.description, &mut errors);
        for (i, feature) in self.features.iter().enumerate() {
            require_non_empty(&format!("features[{}]", i), feature, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::Validation { errors })
        }
    }

    /// Values available to template placeholders.
    ///
    /// Built-in fields take precedence over context entries with the same name.
    #[must_use]
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.context.clone();
        fields.insert("id".to_string(), self.id.clone());
        fields.insert("taskId".to_string(), self.id.clone());
        fields.insert("description".to_string(), self.description.clone());
        fields.insert("type".to_string(), self.task_type.to_string());
        fields.insert("complexity".to_string(), self.complexity.to_string());
        fields.insert("features".to_string(), self.features.join(", "));
        if let Some(template) = &self.template {
            fields.insert("template".to_string(), template.clone());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let task = Task::new("t1", "Something");
        assert_eq!(task.task_type, TaskType::Unknown);
        assert_eq!(task.complexity, Complexity::Medium);
        assert!(task.features.is_empty());
    }

    #[test]
    fn test_with_feature_dedups() {
        let task = Task::new("t1", "x")
            .with_feature("validation")
            .with_feature("typescript")
            .with_feature("validation");
        assert_eq!(task.features, vec!["validation", "typescript"]);
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let err = Task::new("", "  ").validate().unwrap_err();
        match err {
            ConductorError::Validation { errors } => {
                assert!(errors.iter().any(|e| e.field == "id"));
                assert!(errors.iter().any(|e| e.field == "description"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_rejects_whitespace_id() {
        assert!(Task::new("task one", "x").validate().is_err());
    }

    #[test]
    fn test_fields_prefer_builtin_over_context() {
        let task = Task::new("t1", "Build it")
            .with_type(TaskType::Logic)
            .with_context("description", "shadowed")
            .with_context("framework", "react");
        let fields = task.fields();
        assert_eq!(fields["description"], "Build it");
        assert_eq!(fields["framework"], "react");
        assert_eq!(fields["type"], "logic");
        assert_eq!(fields["features"], "");
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("UI".parse::<TaskType>().unwrap(), TaskType::Ui);
        assert_eq!(" design ".parse::<TaskType>().unwrap(), TaskType::Design);
        assert!("rocket".parse::<TaskType>().is_err());
        assert_eq!("High".parse::<Complexity>().unwrap(), Complexity::High);
        assert!("extreme".parse::<Complexity>().is_err());
    }

    #[test]
    fn test_task_serde_shape() {
        let json = r#"{"id":"t1","description":"d","type":"ui","complexity":"high","features":["validation"]}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.task_type, TaskType::Ui);
        assert_eq!(task.complexity, Complexity::High);

        let out = serde_json::to_string(&task).unwrap();
        assert!(out.contains(r#""type":"ui""#));
        assert!(!out.contains("context"));
    }

    #[test]
    fn test_complexity_weights() {
        assert_eq!(Complexity::Low.efficiency_weight(), 0.8);
        assert_eq!(Complexity::Medium.efficiency_weight(), 1.0);
        assert_eq!(Complexity::High.efficiency_weight(), 1.2);
    }
}
