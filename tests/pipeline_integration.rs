//! Integration tests for the task pipeline
//!
//! These exercise the public API across module boundaries: analysis,
//! template selection, token accounting, quality scoring and the
//! orchestrator with persisted state.

use std::sync::Arc;

use conductor::analytics::{PhaseCost, TokenTracker};
use conductor::pipeline::{Orchestrator, TaskOutcome};
use conductor::prompt::TemplateManager;
use conductor::quality::{ImplementationComparator, QualityAnalyzer};
use conductor::task::{TaskAnalyzer, TaskType};
use conductor::testing::{
    async_fetch_task, login_form_task, MockExecutionConnector, MockToolConnector, ScriptedScoring,
    LOGIN_FORM_IMPLEMENTATION,
};
use conductor::tools::{default_profiles, ToolSelector};
use conductor::{ConductorConfig, Implementation, MetricsCollector};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn test_login_form_scenario() {
    let task = login_form_task();
    task.validate().unwrap();

    let analysis = TaskAnalyzer::new().analyze(&task);
    assert_eq!(analysis.task_type, TaskType::Ui);
    assert!(analysis.features.iter().any(|f| f == "validation"));

    let manager = TemplateManager::with_defaults(&["claude"]);
    let template_type = manager.get_best_template_type("claude", &task).unwrap();
    assert_eq!(template_type, "component");
    let prompt = manager.get_template("claude", &template_type, &task).unwrap();
    assert!(prompt.contains("Create a login form component with validation"));

    let mut tracker = TokenTracker::in_memory();
    tracker.start_task(&task.id, task.task_type, task.complexity).unwrap();
    tracker.record_direct_cost(&task.id, 1200).unwrap();
    tracker
        .record_delegated_cost(&task.id, "claude", PhaseCost::from_total(300))
        .unwrap();
    tracker.complete_task(&task.id, Some(8.0)).unwrap();

    let report = tracker.compare_efficiency("t1").unwrap();
    assert_eq!(report.direct, 1200);
    assert_eq!(report.delegated, 300);
    assert!((report.efficiency_gain - 75.0).abs() < 0.01);
}

#[test]
fn test_two_tool_comparison_scenario() {
    let comparator = ImplementationComparator::new(QualityAnalyzer::new(ScriptedScoring));
    let implementations = vec![
        Implementation::new("claude", "score: 8.5"),
        Implementation::new("ui-specialist", "score: 6.0\nperformance: 4"),
    ];

    let report = comparator.compare(&implementations, &login_form_task()).unwrap();
    assert_eq!(report.findings.best_tool, "claude");
    assert_eq!(report.ranked[0].overall_score, 8.5);
    // Only one of two implementations is weak on performance.
    assert!(report.common_weaknesses.is_empty());
}

#[tokio::test]
async fn test_orchestrator_with_mock_tools() {
    let mut tools = ToolSelector::new();
    for profile in default_profiles() {
        let connector = MockToolConnector::new(&profile.name)
            .with_response(LOGIN_FORM_IMPLEMENTATION)
            .with_usage(150, 150);
        tools.register(profile, Arc::new(connector));
    }
    let execution = Arc::new(MockExecutionConnector::new());
    let orchestrator = Orchestrator::new(tools, execution.clone());
    let cancel = CancellationToken::new();

    let first = orchestrator.process_task(login_form_task(), &cancel).await.unwrap();
    let second = orchestrator.process_task(async_fetch_task(), &cancel).await.unwrap();
    assert!(first.is_completed());
    assert!(second.is_completed());
    assert_eq!(execution.call_count(), 2);

    let stats = orchestrator.tracker().lock().await.get_stats();
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.total_delegated, 600);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let config = ConductorConfig::default();
    let cancel = CancellationToken::new();

    let orchestrator = Orchestrator::from_config(&config, temp.path()).unwrap();
    let outcome = orchestrator.process_task(login_form_task(), &cancel).await.unwrap();
    let TaskOutcome::Completed(report) = outcome else {
        panic!("simulated backend should complete the task");
    };
    orchestrator.save().await.unwrap();

    let tracker = TokenTracker::open(temp.path()).unwrap();
    let record = tracker.record("t1").unwrap();
    assert_eq!(record.delegated.tool_name.as_deref(), Some(report.selected_tool.as_str()));

    let metrics = MetricsCollector::open(temp.path()).unwrap();
    assert_eq!(metrics.data().total_tasks, 1);
    assert_eq!(metrics.data().successful_tasks, 1);

    // A reopened orchestrator rejects the already-tracked id.
    let reopened = Orchestrator::from_config(&config, temp.path()).unwrap();
    assert!(reopened.process_task(login_form_task(), &cancel).await.is_err());
}
