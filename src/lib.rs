//! Conductor - task orchestration for delegated code generation
//!
//! Conductor takes a free-text coding task, decides what kind of work it is,
//! delegates it to the best-suited code-generation tool through a filled
//! prompt template, and accounts for what that cost and how good the result
//! was.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`validation`] - Field-level shape checks shared by every component
//! - [`task`] - Task model and the keyword-based task analyzer
//! - [`prompt`] - Tool-keyed template registry and placeholder filling
//! - [`tools`] - Tool selection, live and simulated connectors, retry
//! - [`analytics`] - Token tracking, metrics aggregation and reports
//! - [`quality`] - Weighted quality rubric, scoring strategies, comparison
//! - [`pipeline`] - The orchestrator driving a task end to end
//! - [`api`] - Wire shapes for exposing the pipeline as a service
//! - [`config`] - Settings loading and validation
//! - [`error`] - Error taxonomy
//! - [`testing`] - Mocks and fixtures
//!
//! # Example
//!
//! ```
//! use conductor::pipeline::{Orchestrator, TaskOutcome};
//! use conductor::testing::{login_form_task, MockExecutionConnector, MockToolConnector};
//! use conductor::tools::{ToolProfile, ToolSelector};
//! use conductor::task::TaskType;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut tools = ToolSelector::new();
//! tools.register(
//!     ToolProfile::new("claude").with_strengths(&[TaskType::Ui]),
//!     Arc::new(MockToolConnector::new("claude").with_usage(100, 200)),
//! );
//! let orchestrator = Orchestrator::new(tools, Arc::new(MockExecutionConnector::new()));
//!
//! let outcome = orchestrator
//!     .process_task(login_form_task(), &CancellationToken::new())
//!     .await
//!     .unwrap();
//! assert!(matches!(outcome, TaskOutcome::Completed(_)));
//! # }
//! ```

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod quality;
pub mod task;
pub mod testing;
pub mod tools;
pub mod validation;

// Re-export commonly used types
pub use error::{ConductorError, Result};

// Re-export config types
pub use config::{Backend, ConductorConfig, ScoringMode};

// Re-export pipeline types
pub use pipeline::{Orchestrator, TaskOutcome};

// Re-export task types
pub use task::{Analysis, Complexity, Task, TaskAnalyzer, TaskType};

// Re-export quality types
pub use quality::{
    ComparisonReport, Implementation, ImplementationComparator, QualityAnalysis, QualityAnalyzer,
    QualityMetric,
};

// Re-export analytics types
pub use analytics::{MetricsCollector, ReportFormat, TokenTracker, TrendDirection};

// Re-export tool types
pub use tools::{ExecutionConnector, ToolConnector, ToolSelector};

// Re-export template types
pub use prompt::{Template, TemplateManager};
