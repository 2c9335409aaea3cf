//! Tool-keyed prompt template registry.
//!
//! Templates are stored per `(tool, template type)` and carry default values
//! for their `{placeholder}` markers. Filling never fails: a placeholder is
//! resolved from the task first, then from the template defaults, and is
//! left as literal text when neither knows it.
//!
//! # Example
//!
//! ```
//! use conductor::prompt::templates::TemplateManager;
//! use conductor::task::{Task, TaskType};
//!
//! let manager = TemplateManager::with_defaults(&["claude"]);
//! let task = Task::new("t1", "Create a login form").with_type(TaskType::Ui);
//!
//! let template_type = manager.get_best_template_type("claude", &task).unwrap();
//! assert_eq!(template_type, "component");
//!
//! let prompt = manager.get_template("claude", &template_type, &task).unwrap();
//! assert!(prompt.contains("Create a login form"));
//! ```

use crate::error::{ConductorError, Result};
use crate::task::{Task, TaskType};
use crate::validation::{is_identifier, require_non_empty, FieldError};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Template type used when no selection rule matches.
pub const DEFAULT_TEMPLATE_TYPE: &str = "default";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid"))
}

/// Replace every `{name}` marker in `body`.
///
/// Resolution order: non-empty `data` value, then `defaults`, then an empty
/// `data` value, otherwise the marker stays as written.
///
/// # Example
///
/// ```
/// use conductor::prompt::templates::fill_template;
/// use std::collections::BTreeMap;
///
/// let mut data = BTreeMap::new();
/// data.insert("name".to_string(), "form".to_string());
/// let mut defaults = BTreeMap::new();
/// defaults.insert("framework".to_string(), "React".to_string());
///
/// let out = fill_template("{name} in {framework} with {unknown}", &data, &defaults);
/// assert_eq!(out, "form in React with {unknown}");
/// ```
#[must_use]
pub fn fill_template(
    body: &str,
    data: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> String {
    placeholder_regex()
        .replace_all(body, |caps: &Captures| {
            let name = &caps[1];
            match (data.get(name), defaults.get(name)) {
                (Some(value), _) if !value.is_empty() => value.clone(),
                (_, Some(default)) => default.clone(),
                (Some(empty), None) => empty.clone(),
                (None, None) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Registry key: one template per tool and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub tool: String,
    pub template_type: String,
}

impl TemplateKey {
    fn new(tool: &str, template_type: &str) -> Self {
        Self {
            tool: tool.to_string(),
            template_type: template_type.to_string(),
        }
    }
}

/// A parameterized prompt skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub tool: String,
    pub template_type: String,
    pub body: String,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl Template {
    /// Create a template without defaults.
    pub fn new(
        tool: impl Into<String>,
        template_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            template_type: template_type.into(),
            body: body.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Add a default placeholder value.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in placeholder_regex().captures_iter(&self.body) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Fill this template for a task.
    #[must_use]
    pub fn render(&self, task: &Task) -> String {
        fill_template(&self.body, &task.fields(), &self.defaults)
    }

    /// Check the key and body.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if !is_identifier(&self.tool) {
            errors.push(FieldError::new("tool", "must be a non-empty identifier"));
        }
        if !is_identifier(&self.template_type) {
            errors.push(FieldError::new("templateType", "must be a non-empty identifier"));
        }
        require_non_empty("body", &self.body, &mut errors);
        for name in self.defaults.keys() {
            if !is_identifier(name) {
                errors.push(FieldError::new(
                    format!("defaults.{}", name),
                    "placeholder names must be identifiers",
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::Validation { errors })
        }
    }

    fn key(&self) -> TemplateKey {
        TemplateKey::new(&self.tool, &self.template_type)
    }
}

/// Ordered rule mapping a task onto a template type.
struct SelectionRule {
    template_type: &'static str,
    task_types: &'static [TaskType],
    keywords: &'static [&'static str],
}

const SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        template_type: "component",
        task_types: &[TaskType::Ui, TaskType::Design],
        keywords: &["component", "ui", "form", "page", "button", "modal", "layout", "interface"],
    },
    SelectionRule {
        template_type: "function",
        task_types: &[TaskType::Logic],
        keywords: &["function", "method", "algorithm", "logic", "handler"],
    },
    SelectionRule {
        template_type: "utility",
        task_types: &[],
        keywords: &["utility", "utilities", "util", "helper", "format", "convert"],
    },
];

/// Registry of templates keyed by `(tool, type)`.
///
/// Mutation is last-writer-wins; the manager is process-local state owned
/// by whoever constructs it.
#[derive(Debug, Clone, Default)]
pub struct TemplateManager {
    templates: BTreeMap<TemplateKey, Template>,
}

impl TemplateManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in templates registered for each tool.
    #[must_use]
    pub fn with_defaults(tools: &[&str]) -> Self {
        let mut manager = Self::new();
        for tool in tools {
            for template in builtin_templates(tool) {
                manager.templates.insert(template.key(), template);
            }
        }
        manager
    }

    /// Merge `*.json` template files from a directory.
    ///
    /// Each file holds one serialized [`Template`]. Existing keys are replaced.
    /// A missing directory loads nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, parsed or validated.
    pub fn load_from_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(0);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in &paths {
            let content = std::fs::read_to_string(path)?;
            let template: Template = serde_json::from_str(&content)?;
            template.validate()?;
            debug!(path = %path.display(), tool = %template.tool, "Loaded template");
            self.templates.insert(template.key(), template);
        }

        info!(count = paths.len(), dir = %dir.display(), "Loaded templates from directory");
        Ok(paths.len())
    }

    /// Pick the template type that best fits a task for a tool.
    ///
    /// An explicit task preference wins when registered. Otherwise the
    /// selection rules are tried in order (component, function, utility)
    /// against the task type and description words, then `default`. Only types
    /// registered for the tool are considered.
    #[must_use]
    pub fn get_best_template_type(&self, tool: &str, task: &Task) -> Option<String> {
        if let Some(preferred) = &task.template {
            if self.has_template(tool, preferred) {
                return Some(preferred.clone());
            }
        }

        let description = task.description.to_lowercase();
        let words: Vec<&str> = description
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        for rule in SELECTION_RULES {
            if !self.has_template(tool, rule.template_type) {
                continue;
            }
            let type_match = rule.task_types.contains(&task.task_type);
            let keyword_match = rule.keywords.iter().any(|k| words.contains(k));
            if type_match || keyword_match {
                debug!(tool, template_type = rule.template_type, "Selected template");
                return Some(rule.template_type.to_string());
            }
        }

        self.has_template(tool, DEFAULT_TEMPLATE_TYPE)
            .then(|| DEFAULT_TEMPLATE_TYPE.to_string())
    }

    /// Get a template filled for a task.
    #[must_use]
    pub fn get_template(&self, tool: &str, template_type: &str, task: &Task) -> Option<String> {
        self.templates
            .get(&TemplateKey::new(tool, template_type))
            .map(|template| template.render(task))
    }

    /// Look up a stored template.
    #[must_use]
    pub fn template(&self, tool: &str, template_type: &str) -> Option<&Template> {
        self.templates.get(&TemplateKey::new(tool, template_type))
    }

    /// Check whether a template is registered.
    #[must_use]
    pub fn has_template(&self, tool: &str, template_type: &str) -> bool {
        self.templates
            .contains_key(&TemplateKey::new(tool, template_type))
    }

    /// Register a new template.
    ///
    /// Returns `Ok(false)` if the key already exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input.
    pub fn create_template(
        &mut self,
        tool: &str,
        template_type: &str,
        body: &str,
        defaults: BTreeMap<String, String>,
    ) -> Result<bool> {
        let template = Template {
            tool: tool.to_string(),
            template_type: template_type.to_string(),
            body: body.to_string(),
            defaults,
        };
        template.validate()?;

        let key = template.key();
        if self.templates.contains_key(&key) {
            return Ok(false);
        }
        self.templates.insert(key, template);
        Ok(true)
    }

    /// Replace the body and defaults of an existing template.
    ///
    /// Returns `Ok(false)` if no such template exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input.
    pub fn update_template(
        &mut self,
        tool: &str,
        template_type: &str,
        body: &str,
        defaults: BTreeMap<String, String>,
    ) -> Result<bool> {
        let updated = Template {
            tool: tool.to_string(),
            template_type: template_type.to_string(),
            body: body.to_string(),
            defaults,
        };
        updated.validate()?;

        match self.templates.get_mut(&updated.key()) {
            Some(existing) => {
                *existing = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a template. Returns `Ok(false)` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either name is not an identifier.
    pub fn delete_template(&mut self, tool: &str, template_type: &str) -> Result<bool> {
        let mut errors = Vec::new();
        if !is_identifier(tool) {
            errors.push(FieldError::new("tool", "must be a non-empty identifier"));
        }
        if !is_identifier(template_type) {
            errors.push(FieldError::new("templateType", "must be a non-empty identifier"));
        }
        if !errors.is_empty() {
            return Err(ConductorError::Validation { errors });
        }

        Ok(self
            .templates
            .remove(&TemplateKey::new(tool, template_type))
            .is_some())
    }

    /// Templates ordered by key, optionally limited to one tool.
    #[must_use]
    pub fn list(&self, tool: Option<&str>) -> Vec<&Template> {
        self.templates
            .values()
            .filter(|t| tool.is_none_or(|name| t.tool == name))
            .collect()
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn builtin_templates(tool: &str) -> Vec<Template> {
    vec![
        Template::new(tool, "component", COMPONENT_TEMPLATE)
            .with_default("framework", "React")
            .with_default("language", "TypeScript")
            .with_default("styling", "Tailwind CSS")
            .with_default("features", "none specified"),
        Template::new(tool, "function", FUNCTION_TEMPLATE)
            .with_default("language", "TypeScript")
            .with_default("features", "none specified"),
        Template::new(tool, "utility", UTILITY_TEMPLATE)
            .with_default("language", "TypeScript"),
        Template::new(tool, DEFAULT_TEMPLATE_TYPE, DEFAULT_TEMPLATE)
            .with_default("language", "TypeScript")
            .with_default("features", "none specified"),
    ]
}

const COMPONENT_TEMPLATE: &str = r#"Create a {framework} component using {language} and {styling}.

Task: {description}
Complexity: {complexity}
Required features: {features}

Requirements:
- Export a single reusable component with typed props
- Handle loading, empty and error states
- Include accessible labels and keyboard support
- Return the complete implementation in one fenced code block
"#;

const FUNCTION_TEMPLATE: &str = r#"Implement the following in {language}.

Task: {description}
Complexity: {complexity}
Required features: {features}

Requirements:
- Pure functions with explicit input and output types
- Validate inputs and report errors instead of throwing silently
- Return the complete implementation in one fenced code block
"#;

const UTILITY_TEMPLATE: &str = r#"Write a small, dependency-free {language} utility.

Task: {description}

Requirements:
- Keep the public surface minimal
- Cover edge cases (empty input, invalid values)
- Return the complete implementation in one fenced code block
"#;

const DEFAULT_TEMPLATE: &str = r#"Complete the following {type} task in {language}.

Task: {description}
Complexity: {complexity}
Required features: {features}

Return the complete implementation in one fenced code block.
"#;
