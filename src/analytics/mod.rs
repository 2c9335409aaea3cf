//! Token accounting, aggregate metrics and reports.
//!
//! - [`tokens`] - per-task direct versus delegated token tracking
//! - [`trends`] - first-third versus last-third trend analysis
//! - [`metrics`] - running aggregates and visualization data
//! - [`reporting`] - report output formats
//!
//! Both stores persist under `.conductor/` and are owned by whoever
//! constructs them; nothing here is global.

pub mod metrics;
pub mod reporting;
pub mod tokens;
pub mod trends;

pub use metrics::{MetricsCollector, MetricsData, TaskMetrics, VisualizationData};
pub use reporting::ReportFormat;
pub use tokens::{EfficiencyReport, PhaseCost, TokenStats, TokenTracker, TokenUsageRecord};
pub use trends::{EfficiencyTrend, TrendDirection};
