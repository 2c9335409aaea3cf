//! Testing infrastructure for conductor.
//!
//! Mocks and fixtures for exercising the pipeline without network access.
//!
//! # Architecture
//!
//! - **Mocks**: connectors with scripted responses, failure counts and call
//!   counting, plus a scoring strategy driven by the code text
//! - **Fixtures**: pre-built tasks and implementations
//!
//! # Example
//!
//! ```
//! use conductor::testing::{login_form_task, MockExecutionConnector, MockToolConnector};
//!
//! let tool = MockToolConnector::new("claude").with_usage(100, 200);
//! let execution = MockExecutionConnector::new().with_fail_count(1);
//! let task = login_form_task();
//! assert_eq!(task.id, "t1");
//! ```

pub mod fixtures;
pub mod mocks;

// Re-export commonly used types
pub use fixtures::*;
pub use mocks::*;
