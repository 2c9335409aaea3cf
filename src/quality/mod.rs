//! Quality scoring of generated implementations.
//!
//! - [`metrics`] - The eight weighted rubric metrics
//! - [`scoring`] - Pluggable scoring strategies
//! - [`analyzer`] - Code extraction and weighted aggregation
//! - [`comparator`] - Ranking and comparison across tools
//!
//! # Architecture
//!
//! ```text
//! implementation text
//!         │
//!         ▼
//!   extract_code()          longest fenced block, or raw text
//!         │
//!         ▼
//!  ScoringStrategy::score() raw 0-10 per metric
//!         │
//!         ▼
//!     aggregate()           weighted overall, strengths, weaknesses,
//!         │                 suggestions
//!         ▼
//!   QualityAnalysis ──────► ImplementationComparator (several tools)
//! ```
//!
//! # Rubric
//!
//! | Metric | Weight |
//! |--------|--------|
//! | functionality | 0.20 |
//! | codeQuality | 0.15 |
//! | architecture | 0.10 |
//! | accessibility | 0.10 |
//! | performance | 0.10 |
//! | visualImplementation | 0.10 |
//! | errorHandling | 0.15 |
//! | tokenEfficiency | 0.10 |

pub mod analyzer;
pub mod comparator;
pub mod metrics;
pub mod scoring;

pub use analyzer::{aggregate, extract_code, MetricScore, QualityAnalysis, QualityAnalyzer};
pub use comparator::{
    ComparisonReport, Findings, Implementation, ImplementationComparator, MetricComparison,
    MetricLeader, RankedImplementation, ToolFrequency, ToolScore, TopPatterns,
};
pub use metrics::{round1, QualityMetric};
pub use scoring::{FixedScoring, HeuristicScoring, MetricScores, RawScore, ScoringStrategy};
