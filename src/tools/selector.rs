//! Tool registry and fit scoring.

use super::ToolConnector;
use crate::task::{Analysis, Complexity, Feature, TaskType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// What a tool is good at and what it costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProfile {
    pub name: String,
    pub strengths: Vec<TaskType>,
    /// Feature names this tool handles well.
    pub feature_affinity: Vec<String>,
    pub max_complexity: Complexity,
    pub cost_factor: f64,
}

impl ToolProfile {
    /// Create a profile with no strengths and zero cost.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strengths: Vec::new(),
            feature_affinity: Vec::new(),
            max_complexity: Complexity::High,
            cost_factor: 0.0,
        }
    }

    #[must_use]
    pub fn with_strengths(mut self, strengths: &[TaskType]) -> Self {
        self.strengths = strengths.to_vec();
        self
    }

    #[must_use]
    pub fn with_affinity(mut self, features: &[Feature]) -> Self {
        self.feature_affinity = features.iter().map(|f| f.name().to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_max_complexity(mut self, complexity: Complexity) -> Self {
        self.max_complexity = complexity;
        self
    }

    #[must_use]
    pub fn with_cost_factor(mut self, cost_factor: f64) -> Self {
        self.cost_factor = cost_factor;
        self
    }

    /// Fit score for an analysis.
    ///
    /// +3 for a type strength, +1 per affine feature, +1 when the complexity
    /// is within reach, minus the cost factor.
    #[must_use]
    pub fn score(&self, analysis: &Analysis) -> f64 {
        let mut score = 0.0;
        if self.strengths.contains(&analysis.task_type) {
            score += 3.0;
        }
        let affine = analysis
            .features
            .iter()
            .filter(|f| self.feature_affinity.iter().any(|a| a.eq_ignore_ascii_case(f)))
            .count();
        score += affine as f64;
        if analysis.complexity <= self.max_complexity {
            score += 1.0;
        }
        score - self.cost_factor
    }
}

/// A tool name with its fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTool {
    pub name: String,
    pub score: f64,
}

struct RegisteredTool {
    profile: ToolProfile,
    connector: Arc<dyn ToolConnector>,
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolSelector {
    tools: Vec<RegisteredTool>,
}

impl std::fmt::Debug for ToolSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSelector")
            .field("tools", &self.profiles().map(|p| &p.name).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, profile: ToolProfile, connector: Arc<dyn ToolConnector>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.profile.name == profile.name) {
            existing.profile = profile;
            existing.connector = connector;
        } else {
            self.tools.push(RegisteredTool { profile, connector });
        }
    }

    /// All tools ordered by descending score; ties keep registration order.
    #[must_use]
    pub fn rank(&self, analysis: &Analysis) -> Vec<ScoredTool> {
        let mut ranked: Vec<ScoredTool> = self
            .tools
            .iter()
            .map(|t| ScoredTool {
                name: t.profile.name.clone(),
                score: t.profile.score(analysis),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(ranking = ?ranked, "Ranked tools");
        ranked
    }

    /// Best tool for an analysis, if any are registered.
    #[must_use]
    pub fn select(&self, analysis: &Analysis) -> Option<ScoredTool> {
        self.rank(analysis).into_iter().next()
    }

    /// Connector for a registered tool.
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<Arc<dyn ToolConnector>> {
        self.tools
            .iter()
            .find(|t| t.profile.name == name)
            .map(|t| Arc::clone(&t.connector))
    }

    /// Profiles in registration order.
    pub fn profiles(&self) -> impl Iterator<Item = &ToolProfile> {
        self.tools.iter().map(|t| &t.profile)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskAnalyzer};
    use crate::tools::{default_profiles, SimulatedToolConnector};

    fn selector_with(profiles: Vec<ToolProfile>) -> ToolSelector {
        let mut selector = ToolSelector::new();
        for profile in profiles {
            let connector = Arc::new(SimulatedToolConnector::new(&profile.name));
            selector.register(profile, connector);
        }
        selector
    }

    #[test]
    fn test_login_form_prefers_generalist() {
        let selector = selector_with(default_profiles());
        let task = Task::new("t1", "Create a login form component with validation")
            .with_type(TaskType::Ui);
        let analysis = TaskAnalyzer::new().analyze(&task);

        let ranked = selector.rank(&analysis);
        assert_eq!(ranked[0].name, "claude");
        assert_eq!(ranked[0].score, 4.0);
        assert_eq!(ranked[1].name, "ui-specialist");
        assert_eq!(ranked[1].score, 3.5);
    }

    #[test]
    fn test_logic_task_prefers_logic_specialist() {
        let selector = selector_with(default_profiles());
        let task = Task::new("t2", "Write an async function to sort and filter records");
        let analysis = TaskAnalyzer::new().analyze(&task);
        assert_eq!(selector.select(&analysis).unwrap().name, "logic-specialist");
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let selector = selector_with(vec![
            ToolProfile::new("first"),
            ToolProfile::new("second"),
            ToolProfile::new("third"),
        ]);
        let analysis = TaskAnalyzer::new().analyze(&Task::new("t", "anything"));
        let names: Vec<_> = selector.rank(&analysis).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_complexity_out_of_reach_loses_point() {
        let profile = ToolProfile::new("small").with_max_complexity(Complexity::Low);
        let task = Task::new("t", "A complex enterprise dashboard");
        let analysis = TaskAnalyzer::new().analyze(&task);
        assert_eq!(analysis.complexity, Complexity::High);
        assert_eq!(profile.score(&analysis), 0.0);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut selector = selector_with(vec![ToolProfile::new("a")]);
        selector.register(
            ToolProfile::new("a").with_cost_factor(2.0),
            Arc::new(SimulatedToolConnector::new("a")),
        );
        assert_eq!(selector.len(), 1);
        assert_eq!(selector.profiles().next().unwrap().cost_factor, 2.0);
    }

    #[test]
    fn test_empty_selector_selects_nothing() {
        let analysis = TaskAnalyzer::new().analyze(&Task::new("t", "x"));
        assert!(ToolSelector::new().select(&analysis).is_none());
    }
}
