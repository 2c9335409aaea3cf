//! Prompt generation.
//!
//! - [`templates`] - tool-keyed template registry and placeholder filling
//!
//! A single registry keyed by `(tool, template type)` serves every tool, so
//! adding a tool means registering templates for it rather than adding a new
//! manager type.

pub mod templates;

pub use templates::{fill_template, Template, TemplateKey, TemplateManager};
