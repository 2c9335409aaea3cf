//! Keyword-driven task analysis.
//!
//! [`TaskAnalyzer::analyze`] turns a free-text task into an [`Analysis`]:
//! detected type, complexity, features, an estimated line count and a token
//! budget split across the analysis, implementation and review phases.
//! The function is pure and never fails; absent fields fall back to neutral
//! values.
//!
//! # Example
//!
//! ```
//! use conductor::task::{Task, TaskAnalyzer, TaskType};
//!
//! let analyzer = TaskAnalyzer::new();
//! let analysis = analyzer.analyze(&Task::new("t1", "Create a login form component with validation"));
//!
//! assert_eq!(analysis.task_type, TaskType::Ui);
//! assert_eq!(analysis.features, vec!["validation".to_string()]);
//! assert_eq!(analysis.token_budget.sum(), analysis.token_budget.total);
//! ```

use super::{Complexity, Task, TaskType};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Keyword Tables
// ============================================================================

// Keywords match whole words (with an optional plural "s"). Entries with a
// space are matched as phrases against the normalized description.

const UI_KEYWORDS: &[&str] = &[
    "component", "form", "button", "page", "layout", "ui", "modal", "navbar", "navigation",
    "screen", "view", "dashboard", "widget", "card", "menu", "sidebar", "header", "footer",
    "input", "dropdown", "user interface",
];

const LOGIC_KEYWORDS: &[&str] = &[
    "function", "algorithm", "utility", "utilities", "util", "helper", "calculate",
    "calculation", "parse", "parser", "process", "logic", "service", "api", "sort", "filter",
    "transform", "convert", "compute", "handler", "reducer", "hook", "endpoint",
];

const DESIGN_KEYWORDS: &[&str] = &[
    "design", "style", "styling", "theme", "color", "colour", "css", "typography", "palette",
    "visual", "branding", "icon", "font", "mockup",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "complex", "advanced", "sophisticated", "enterprise", "comprehensive", "intricate",
];

const SIMPLE_KEYWORDS: &[&str] = &["simple", "basic", "minimal", "trivial", "quick", "small"];

/// Line additions for declared features outside the known groups.
const UNKNOWN_FEATURE_LINES: u32 = 10;

/// Tokens per estimated line of code.
const TOKENS_PER_LINE: u64 = 10;

// ============================================================================
// Features
// ============================================================================

/// Feature groups detected by the analyzer, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    StateManagement,
    AsyncOperations,
    Accessibility,
    Animations,
    Validation,
    TypeScript,
    ResponsiveDesign,
}

impl Feature {
    /// Groups in their fixed detection order.
    pub const ALL: [Feature; 7] = [
        Self::StateManagement,
        Self::AsyncOperations,
        Self::Accessibility,
        Self::Animations,
        Self::Validation,
        Self::TypeScript,
        Self::ResponsiveDesign,
    ];

    /// Name used in analyses and task feature lists.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateManagement => "stateManagement",
            Self::AsyncOperations => "asyncOperations",
            Self::Accessibility => "accessibility",
            Self::Animations => "animations",
            Self::Validation => "validation",
            Self::TypeScript => "typescript",
            Self::ResponsiveDesign => "responsiveDesign",
        }
    }

    /// Look up a group by name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Feature> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::StateManagement => &[
                "state", "redux", "store", "zustand", "usestate", "usereducer", "mobx", "recoil",
                "context api",
            ],
            Self::AsyncOperations => &[
                "async", "await", "fetch", "api", "promise", "request", "axios", "loading",
                "websocket", "realtime",
            ],
            Self::Accessibility => &[
                "accessible", "accessibility", "a11y", "aria", "keyboard", "wcag",
                "screen reader",
            ],
            Self::Animations => &["animation", "animated", "animate", "transition", "motion", "framer"],
            Self::Validation => &[
                "validation", "validate", "validator", "validated", "schema", "zod", "yup",
                "required field",
            ],
            Self::TypeScript => &["typescript", "ts", "tsx", "typed", "generic"],
            Self::ResponsiveDesign => &[
                "responsive", "mobile", "breakpoint", "tablet", "adaptive", "media query",
            ],
        }
    }

    /// Complexity points contributed by this feature.
    #[must_use]
    pub fn points(&self) -> u32 {
        match self {
            Self::StateManagement | Self::AsyncOperations => 2,
            _ => 1,
        }
    }

    /// Estimated lines of code this feature adds.
    #[must_use]
    pub fn line_addition(&self) -> u32 {
        match self {
            Self::StateManagement => 40,
            Self::AsyncOperations => 30,
            Self::Accessibility => 20,
            Self::Animations => 25,
            Self::Validation => 20,
            Self::TypeScript => 15,
            Self::ResponsiveDesign => 25,
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Token budget split across delegation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenBudget {
    pub analysis: u64,
    pub implementation: u64,
    pub review: u64,
    pub total: u64,
}

impl TokenBudget {
    /// Split a total 20/60/20. The implementation share absorbs rounding.
    #[must_use]
    pub fn split(total: u64) -> Self {
        let analysis = (total as f64 * 0.2).round() as u64;
        let review = (total as f64 * 0.2).round() as u64;
        Self {
            analysis,
            implementation: total.saturating_sub(analysis + review),
            review,
            total,
        }
    }

    /// Sum of the three phases.
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.analysis + self.implementation + self.review
    }
}

/// Result of analyzing a task. Always recomputed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub features: Vec<String>,
    pub estimated_lines: u32,
    pub token_budget: TokenBudget,
}

impl Analysis {
    /// Check whether a feature group was detected.
    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.iter().any(|f| f == feature.name())
    }
}

/// Normalized view of a description for keyword matching.
struct Keywords {
    words: Vec<String>,
    normalized: String,
}

impl Keywords {
    fn new(text: &str) -> Self {
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect();
        let normalized = words.join(" ");
        Self { words, normalized }
    }

    fn matches(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            return format!(" {} ", self.normalized).contains(&format!(" {} ", keyword));
        }
        self.words.iter().any(|w| {
            w == keyword || (w.len() == keyword.len() + 1 && w.starts_with(keyword) && w.ends_with('s'))
        })
    }

    fn any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.matches(k))
    }
}

/// Derives an [`Analysis`] from a [`Task`].
#[derive(Debug, Clone)]
pub struct TaskAnalyzer {
    fallback_type: TaskType,
}

impl Default for TaskAnalyzer {
    fn default() -> Self {
        Self {
            fallback_type: TaskType::Ui,
        }
    }
}

impl TaskAnalyzer {
    /// Create an analyzer that falls back to `ui` for unmatched tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the type used when neither keywords nor the declared type decide.
    #[must_use]
    pub fn with_fallback_type(mut self, task_type: TaskType) -> Self {
        self.fallback_type = task_type;
        self
    }

    /// Analyze a task.
    #[must_use]
    pub fn analyze(&self, task: &Task) -> Analysis {
        let keywords = Keywords::new(&task.description);

        let task_type = self.determine_type(&keywords, task.task_type);
        let (known, extra) = detect_features(&keywords, &task.features);
        let complexity = determine_complexity(&keywords, &known, extra.len());
        let estimated_lines = estimate_lines(task_type, complexity, &known, extra.len());
        let token_budget = TokenBudget::split(u64::from(estimated_lines) * TOKENS_PER_LINE);

        let mut features: Vec<String> = known.iter().map(|f| f.name().to_string()).collect();
        features.extend(extra);

        debug!(
            task_id = %task.id,
            task_type = %task_type,
            complexity = %complexity,
            features = features.len(),
            tokens = token_budget.total,
            "Analyzed task"
        );

        Analysis {
            task_type,
            complexity,
            features,
            estimated_lines,
            token_budget,
        }
    }

    fn determine_type(&self, keywords: &Keywords, declared: TaskType) -> TaskType {
        let ordered = [
            (TaskType::Ui, UI_KEYWORDS),
            (TaskType::Logic, LOGIC_KEYWORDS),
            (TaskType::Design, DESIGN_KEYWORDS),
        ];
        for (task_type, words) in ordered {
            if keywords.any(words) {
                return task_type;
            }
        }
        if declared != TaskType::Unknown {
            declared
        } else {
            self.fallback_type
        }
    }
}

/// Known groups in fixed order, plus unrecognized declared features in declared order.
fn detect_features(keywords: &Keywords, declared: &[String]) -> (Vec<Feature>, Vec<String>) {
    let declared_known: Vec<Feature> = declared.iter().filter_map(|d| Feature::from_name(d)).collect();

    let known = Feature::ALL
        .into_iter()
        .filter(|f| declared_known.contains(f) || keywords.any(f.keywords()))
        .collect();

    let extra = declared
        .iter()
        .filter(|d| Feature::from_name(d).is_none())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    (known, extra)
}

fn determine_complexity(keywords: &Keywords, known: &[Feature], extra: usize) -> Complexity {
    if keywords.any(COMPLEX_KEYWORDS) {
        return Complexity::High;
    }
    if keywords.any(SIMPLE_KEYWORDS) {
        return Complexity::Low;
    }

    let points: u32 = known.iter().map(Feature::points).sum::<u32>() + extra as u32;
    match points {
        0..=2 => Complexity::Low,
        3..=5 => Complexity::Medium,
        _ => Complexity::High,
    }
}

fn base_lines(task_type: TaskType) -> f64 {
    match task_type {
        TaskType::Ui => 150.0,
        TaskType::Logic => 100.0,
        TaskType::Design => 80.0,
        TaskType::Unknown => 100.0,
    }
}

fn estimate_lines(task_type: TaskType, complexity: Complexity, known: &[Feature], extra: usize) -> u32 {
    let base = (base_lines(task_type) * complexity.line_multiplier()).round() as u32;
    let additions: u32 = known.iter().map(Feature::line_addition).sum();
    base + additions + extra as u32 * UNKNOWN_FEATURE_LINES
}
