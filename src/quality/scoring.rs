//! Pluggable scoring strategies.
//!
//! A [`ScoringStrategy`] turns extracted code into a raw 0-10 score per
//! [`QualityMetric`], together with the observations that justify it.
//! Aggregation into an overall score lives in the analyzer, so strategies
//! stay small and swappable.
//!
//! Two strategies ship with the crate:
//!
//! - [`FixedScoring`] returns constant scores (overall 7.2) regardless of
//!   input. Useful as a deterministic baseline.
//! - [`HeuristicScoring`] inspects text signals in the code: exports, types,
//!   comments, ARIA attributes, styling classes, error handling, and size.

use std::collections::BTreeMap;

use super::metrics::QualityMetric;
use crate::error::Result;
use crate::task::{Task, TaskType};

/// Raw score for a single metric with its supporting observations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawScore {
    /// Score in `[0, 10]`.
    pub raw: f64,
    /// What the code does well for this metric.
    pub strengths: Vec<String>,
    /// What the code is missing for this metric.
    pub weaknesses: Vec<String>,
}

impl RawScore {
    /// Create a score with no observations.
    #[must_use]
    pub fn new(raw: f64) -> Self {
        Self {
            raw,
            ..Default::default()
        }
    }

    /// Add a strength.
    #[must_use]
    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strengths.push(strength.into());
        self
    }

    /// Add a weakness.
    #[must_use]
    pub fn with_weakness(mut self, weakness: impl Into<String>) -> Self {
        self.weaknesses.push(weakness.into());
        self
    }
}

/// Raw scores keyed by metric.
pub type MetricScores = BTreeMap<QualityMetric, RawScore>;

/// Strategy that scores extracted code.
pub trait ScoringStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Score `code` (already extracted from `implementation`) for `task`.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be scored. The analyzer turns
    /// this into a failed analysis instead of propagating it.
    fn score(&self, code: &str, implementation: &str, task: &Task) -> Result<MetricScores>;
}

// ============================================================================
// Fixed Scoring
// ============================================================================

/// Constant scores, independent of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedScoring;

impl ScoringStrategy for FixedScoring {
    fn name(&self) -> &str {
        "fixed"
    }

    fn score(&self, _code: &str, _implementation: &str, _task: &Task) -> Result<MetricScores> {
        let mut scores = MetricScores::new();
        scores.insert(
            QualityMetric::Functionality,
            RawScore::new(8.0)
                .with_strength("Implements the requested behaviour")
                .with_strength("Exposes a usable entry point"),
        );
        scores.insert(QualityMetric::CodeQuality, RawScore::new(7.0));
        scores.insert(QualityMetric::Architecture, RawScore::new(7.0));
        scores.insert(
            QualityMetric::Accessibility,
            RawScore::new(6.0).with_weakness("Limited accessibility attributes"),
        );
        scores.insert(QualityMetric::Performance, RawScore::new(7.0));
        scores.insert(QualityMetric::VisualImplementation, RawScore::new(7.0));
        scores.insert(QualityMetric::ErrorHandling, RawScore::new(7.0));
        scores.insert(
            QualityMetric::TokenEfficiency,
            RawScore::new(8.0).with_strength("Compact implementation"),
        );
        Ok(scores)
    }
}

// ============================================================================
// Heuristic Scoring
// ============================================================================

/// Score assigned to UI-only metrics for non-UI tasks.
const NEUTRAL_SCORE: f64 = 7.0;

/// Lines longer than this count against code quality.
const LONG_LINE: usize = 120;

/// Text-signal heuristics per metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScoring;

/// Accumulates a score and its observations, clamped to `[0, 10]`.
struct Tally {
    score: f64,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
}

impl Tally {
    fn start(score: f64) -> Self {
        Self {
            score,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
        }
    }

    /// Reward `points` when `present`, otherwise record `missing` as a weakness.
    fn signal(&mut self, present: bool, points: f64, found: &str, missing: &str) {
        if present {
            self.score += points;
            if !found.is_empty() {
                self.strengths.push(found.to_string());
            }
        } else if !missing.is_empty() {
            self.weaknesses.push(missing.to_string());
        }
    }

    fn penalty(&mut self, present: bool, points: f64, weakness: &str) {
        if present {
            self.score -= points;
            self.weaknesses.push(weakness.to_string());
        }
    }

    fn finish(self) -> RawScore {
        RawScore {
            raw: self.score.clamp(0.0, 10.0),
            strengths: self.strengths,
            weaknesses: self.weaknesses,
        }
    }
}

/// Pre-computed views of the code shared by the metric checks.
struct Source<'a> {
    lower: String,
    lines: Vec<&'a str>,
}

impl<'a> Source<'a> {
    fn new(code: &'a str) -> Self {
        Self {
            lower: code.to_lowercase(),
            lines: code.lines().filter(|l| !l.trim().is_empty()).collect(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.has(n))
    }

    fn count(&self, needle: &str) -> usize {
        self.lower.matches(needle).count()
    }

    fn duplicated_lines(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| l.len() > 12)
            .filter(|l| !seen.insert(*l))
            .count()
    }
}

impl HeuristicScoring {
    fn functionality(src: &Source<'_>, task: &Task) -> RawScore {
        let mut t = Tally::start(5.0);
        t.signal(
            src.has_any(&["export ", "module.exports", "pub fn", "pub struct"]),
            2.0,
            "Exports a usable entry point",
            "No exported entry point",
        );
        t.signal(
            src.has_any(&["function ", "=>", "fn ", "def ", "class "]),
            1.0,
            "",
            "No function or component definitions found",
        );
        t.signal(src.lines.len() >= 10, 1.0, "", "Implementation looks incomplete");

        let words: Vec<String> = task
            .description
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(str::to_lowercase)
            .collect();
        let covered = words.iter().filter(|w| src.has(w)).count();
        t.signal(
            covered >= 2 || (!words.is_empty() && covered == words.len()),
            1.0,
            "Addresses the terms of the task description",
            "",
        );
        t.finish()
    }

    fn code_quality(src: &Source<'_>) -> RawScore {
        let mut t = Tally::start(6.0);
        t.signal(
            src.has_any(&["interface ", "type ", ": string", ": number", ": boolean", "-> "]),
            1.5,
            "Uses explicit types",
            "Missing type annotations",
        );
        t.signal(
            src.has_any(&["//", "/*", "# "]),
            1.0,
            "Includes explanatory comments",
            "No comments",
        );
        t.signal(src.has("const "), 0.5, "", "");
        t.penalty(src.has("var "), 1.0, "Uses `var` declarations");
        t.penalty(
            src.lines.iter().any(|l| l.len() > LONG_LINE),
            0.5,
            "Contains very long lines",
        );
        t.finish()
    }

    fn architecture(src: &Source<'_>) -> RawScore {
        let mut t = Tally::start(6.0);
        let units = src.count("function ") + src.count("fn ") + src.count("class ") + src.count(" = (");
        t.signal(
            units >= 2,
            1.5,
            "Split into several focused units",
            "Logic is concentrated in a single unit",
        );
        t.signal(src.has_any(&["import ", "use ", "require("]), 1.0, "Declares its dependencies", "");
        t.signal(src.has_any(&["interface ", "props", "struct "]), 0.5, "Typed interfaces between units", "");
        t.finish()
    }

    fn accessibility(src: &Source<'_>, ui: bool) -> RawScore {
        if !ui {
            return RawScore::new(NEUTRAL_SCORE);
        }
        let mut t = Tally::start(4.0);
        t.signal(src.has("aria-"), 2.0, "Uses ARIA attributes", "Missing ARIA attributes");
        t.signal(src.has("role="), 1.0, "Declares element roles", "");
        t.signal(
            src.has_any(&["<label", "htmlfor", "aria-label"]),
            1.5,
            "Labels form controls",
            "Form controls are not labelled",
        );
        t.signal(src.has("alt="), 1.0, "Provides alternative text", "");
        t.signal(src.has_any(&["onkeydown", "onkeyup", "tabindex"]), 0.5, "Supports keyboard interaction", "");
        t.finish()
    }

    fn performance(src: &Source<'_>) -> RawScore {
        let mut t = Tally::start(7.0);
        t.signal(
            src.has_any(&["usememo", "usecallback", "react.memo", "memo(", "cache"]),
            1.5,
            "Memoizes derived values",
            "",
        );
        t.signal(src.has_any(&["debounce", "throttle", "lazy("]), 0.5, "Limits redundant work", "");
        t.penalty(
            src.has("json.parse(json.stringify"),
            1.0,
            "Deep-clones through JSON serialization",
        );
        t.penalty(src.count("for (") + src.count("for ") > 4, 1.0, "Many loops in a single implementation");
        t.finish()
    }

    fn visual(src: &Source<'_>, ui: bool) -> RawScore {
        if !ui {
            return RawScore::new(NEUTRAL_SCORE);
        }
        let mut t = Tally::start(4.0);
        t.signal(
            src.has_any(&["classname=", "class=", "styled.", "style="]),
            2.0,
            "Applies consistent styling",
            "No styling applied",
        );
        t.signal(
            src.has_any(&["sm:", "md:", "lg:", "@media", "flex", "grid"]),
            1.5,
            "Responsive layout",
            "Layout is not responsive",
        );
        t.signal(src.has_any(&["transition", "animate", "hover:"]), 1.0, "Interactive visual feedback", "");
        t.finish()
    }

    fn error_handling(src: &Source<'_>) -> RawScore {
        let mut t = Tally::start(4.0);
        t.signal(
            src.has("try") && src.has("catch"),
            2.0,
            "Catches failures",
            "No try/catch around fallible work",
        );
        t.signal(src.has("throw ") || src.has("err("), 1.0, "Signals invalid states", "");
        t.signal(
            src.has_any(&["valid", "if (!", "required"]),
            1.5,
            "Validates inputs",
            "Inputs are not validated",
        );
        t.signal(src.has("error"), 0.5, "", "");
        t.finish()
    }

    fn token_efficiency(src: &Source<'_>) -> RawScore {
        let lines = src.lines.len();
        let base = match lines {
            0..=80 => 9.0,
            81..=150 => 8.0,
            151..=300 => 7.0,
            301..=500 => 6.0,
            _ => 5.0,
        };
        let mut t = Tally::start(base);
        if lines <= 150 {
            t.strengths.push(format!("Compact implementation ({} lines)", lines));
        }
        t.penalty(src.duplicated_lines() > 5, 1.0, "Contains duplicated lines");
        t.finish()
    }
}

impl ScoringStrategy for HeuristicScoring {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn score(&self, code: &str, _implementation: &str, task: &Task) -> Result<MetricScores> {
        let src = Source::new(code);
        let ui = matches!(task.task_type, TaskType::Ui | TaskType::Design);

        let mut scores = MetricScores::new();
        scores.insert(QualityMetric::Functionality, Self::functionality(&src, task));
        scores.insert(QualityMetric::CodeQuality, Self::code_quality(&src));
        scores.insert(QualityMetric::Architecture, Self::architecture(&src));
        scores.insert(QualityMetric::Accessibility, Self::accessibility(&src, ui));
        scores.insert(QualityMetric::Performance, Self::performance(&src));
        scores.insert(QualityMetric::VisualImplementation, Self::visual(&src, ui));
        scores.insert(QualityMetric::ErrorHandling, Self::error_handling(&src));
        scores.insert(QualityMetric::TokenEfficiency, Self::token_efficiency(&src));
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESSIBLE_FORM: &str = r#"import React, { useState, useCallback } from 'react';

// Props accepted by the login form.
interface LoginFormProps {
  onSubmit: (email: string, password: string) => Promise<void>;
}

export function LoginForm({ onSubmit }: LoginFormProps) {
  const [email, setEmail] = useState('');
  const [error, setError] = useState<string | null>(null);

  const handleSubmit = useCallback(async () => {
    if (!email) {
      setError('Email is required');
      return;
    }
    try {
      await onSubmit(email, '');
    } catch (e) {
      setError('Login failed');
    }
  }, [email, onSubmit]);

  return (
    <form role="form" aria-label="Login" className="flex flex-col md:w-1/2 transition">
      <label htmlFor="email">Email</label>
      <input id="email" aria-invalid={!!error} value={email} onChange={e => setEmail(e.target.value)} />
      <button type="submit" onClick={handleSubmit}>Log in</button>
    </form>
  );
}
"#;

    fn login_task() -> Task {
        Task::new("t1", "Create a login form component with validation").with_type(TaskType::Ui)
    }

    #[test]
    fn test_fixed_scores_cover_every_metric() {
        let scores = FixedScoring.score("", "", &login_task()).unwrap();
        assert_eq!(scores.len(), QualityMetric::ALL.len());
        let overall: f64 = scores.iter().map(|(m, s)| m.weight() * s.raw).sum();
        assert!((overall - 7.2).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_rewards_accessible_form() {
        let scores = HeuristicScoring.score(ACCESSIBLE_FORM, ACCESSIBLE_FORM, &login_task()).unwrap();
        let a11y = &scores[&QualityMetric::Accessibility];
        assert!(a11y.raw >= 8.0, "accessibility was {}", a11y.raw);
        assert!(a11y.strengths.iter().any(|s| s.contains("ARIA")));
        assert!(scores[&QualityMetric::ErrorHandling].raw >= 8.0);
        assert!(scores[&QualityMetric::Functionality].raw >= 8.0);
    }

    #[test]
    fn test_heuristic_flags_bare_code() {
        let code = "var x = 1;\nvar y = 2;";
        let scores = HeuristicScoring.score(code, code, &login_task()).unwrap();
        assert!(scores[&QualityMetric::Accessibility].raw < 6.0);
        assert!(scores[&QualityMetric::ErrorHandling].raw < 6.0);
        assert!(scores[&QualityMetric::CodeQuality]
            .weaknesses
            .iter()
            .any(|w| w.contains("var")));
    }

    #[test]
    fn test_heuristic_neutral_ui_metrics_for_logic() {
        let task = Task::new("t2", "Sort a list of numbers").with_type(TaskType::Logic);
        let code = "export function sortNumbers(xs: number[]) { return [...xs].sort((a, b) => a - b); }";
        let scores = HeuristicScoring.score(code, code, &task).unwrap();
        assert_eq!(scores[&QualityMetric::Accessibility].raw, NEUTRAL_SCORE);
        assert_eq!(scores[&QualityMetric::VisualImplementation].raw, NEUTRAL_SCORE);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let huge = "var a = JSON.parse(JSON.stringify(b));\n".repeat(600);
        let scores = HeuristicScoring.score(&huge, &huge, &login_task()).unwrap();
        for score in scores.values() {
            assert!((0.0..=10.0).contains(&score.raw));
        }
    }
}
