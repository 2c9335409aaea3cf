//! Shape and type checks shared by every component.
//!
//! [`ObjectSchema`] is a small JSON-schema-like validator: it checks a
//! `serde_json::Value` against a list of [`FieldRule`]s and reports every
//! offending field at once, so callers can surface field-level detail.
//!
//! # Example
//!
//! ```
//! use conductor::validation::{FieldKind, FieldRule, ObjectSchema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::new()
//!     .field(FieldRule::new("description", FieldKind::String).required().min_length(1))
//!     .field(FieldRule::new("type", FieldKind::String).one_of(&["ui", "logic"]));
//!
//! assert!(schema.validate(&json!({"description": "x", "type": "ui"})).is_ok());
//! assert!(schema.validate(&json!({"type": "other"})).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// JSON value kinds understood by [`FieldRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Validation rule for one field of an object.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    kind: FieldKind,
    required: bool,
    allowed: Option<Vec<String>>,
    min_length: Option<usize>,
    item_kind: Option<FieldKind>,
}

impl FieldRule {
    /// Create an optional rule for `name` of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            allowed: None,
            min_length: None,
            item_kind: None,
        }
    }

    /// Mark the field as required. `null` counts as missing.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict string values to a fixed set.
    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| (*v).to_string()).collect());
        self
    }

    /// Minimum length for strings (trimmed) and arrays.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Required kind of each array item.
    #[must_use]
    pub fn items(mut self, kind: FieldKind) -> Self {
        self.item_kind = Some(kind);
        self
    }

    fn check(&self, value: Option<&Value>, errors: &mut Vec<FieldError>) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(FieldError::new(&self.name, "is required"));
                }
                return;
            }
            Some(v) => v,
        };

        if !self.kind.matches(value) {
            errors.push(FieldError::new(
                &self.name,
                format!("must be a {}", self.kind.name()),
            ));
            return;
        }

        if let (Some(allowed), Some(s)) = (&self.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                errors.push(FieldError::new(
                    &self.name,
                    format!("must be one of {}", allowed.join(", ")),
                ));
            }
        }

        if let Some(min) = self.min_length {
            let len = match value {
                Value::String(s) => s.trim().chars().count(),
                Value::Array(items) => items.len(),
                _ => min,
            };
            if len < min {
                errors.push(FieldError::new(
                    &self.name,
                    format!("must have length of at least {}", min),
                ));
            }
        }

        if let (Some(kind), Some(items)) = (self.item_kind, value.as_array()) {
            for (i, item) in items.iter().enumerate() {
                if !kind.matches(item) {
                    errors.push(FieldError::new(
                        format!("{}[{}]", self.name, i),
                        format!("must be a {}", kind.name()),
                    ));
                }
            }
        }
    }
}

/// Validator for JSON objects built from [`FieldRule`]s.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    rules: Vec<FieldRule>,
}

impl ObjectSchema {
    /// Create an empty schema (accepts any object).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field rule.
    #[must_use]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validate a value, collecting every field error.
    ///
    /// # Errors
    ///
    /// Returns all field errors when the value is not an object or any rule fails.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<FieldError>> {
        let Some(object) = value.as_object() else {
            return Err(vec![FieldError::new("$", "must be an object")]);
        };

        let mut errors = Vec::new();
        for rule in &self.rules {
            rule.check(object.get(&rule.name), &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Check that a string field is non-empty after trimming.
pub fn require_non_empty(field: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    }
}

/// Check that a value is a usable identifier (`[A-Za-z0-9_-]+`).
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check that a number lies in an inclusive range.
pub fn check_range(field: &str, value: f64, min: f64, max: f64, errors: &mut Vec<FieldError>) {
    if !(min..=max).contains(&value) {
        errors.push(FieldError::new(
            field,
            format!("must be between {} and {}", min, max),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_schema() -> ObjectSchema {
        ObjectSchema::new()
            .field(
                FieldRule::new("description", FieldKind::String)
                    .required()
                    .min_length(1),
            )
            .field(FieldRule::new("type", FieldKind::String).one_of(&["ui", "logic", "design"]))
            .field(FieldRule::new("features", FieldKind::Array).items(FieldKind::String))
    }

    #[test]
    fn test_valid_object_passes() {
        let value = json!({"description": "Build a form", "type": "ui", "features": ["validation"]});
        assert!(task_schema().validate(&value).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let value = json!({"type": "spaceship", "features": ["ok", 3]});
        let errors = task_schema().validate(&value).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "description"));
        assert!(errors.iter().any(|e| e.field == "type"));
        assert!(errors.iter().any(|e| e.field == "features[1]"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let errors = task_schema()
            .validate(&json!({"description": null}))
            .unwrap_err();
        assert_eq!(errors[0].message, "is required");
    }

    #[test]
    fn test_whitespace_string_fails_min_length() {
        let errors = task_schema()
            .validate(&json!({"description": "   "}))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least 1"));
    }

    #[test]
    fn test_wrong_kind_reported() {
        let errors = task_schema()
            .validate(&json!({"description": 42}))
            .unwrap_err();
        assert_eq!(errors[0].message, "must be a string");
    }

    #[test]
    fn test_non_object_rejected() {
        let errors = task_schema().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(errors[0].field, "$");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("claude"));
        assert!(is_identifier("ui-specialist_2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("a{b}"));
    }

    #[test]
    fn test_check_range() {
        let mut errors = Vec::new();
        check_range("temperature", 0.7, 0.0, 1.0, &mut errors);
        assert!(errors.is_empty());
        check_range("temperature", 1.5, 0.0, 1.0, &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_require_non_empty() {
        let mut errors = Vec::new();
        require_non_empty("body", "  ", &mut errors);
        require_non_empty("tool", "claude", &mut errors);
        assert_eq!(errors, vec![FieldError::new("body", "must not be empty")]);
    }
}
