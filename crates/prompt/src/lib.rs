//! Prompt system for CDSS.
//!
//! This crate owns the text the completion service sees:
//! - Built-in clinical grounding templates
//! - Handlebars rendering
//! - Per-workspace template overrides

pub mod builder;
pub mod loader;
pub mod templates;
pub mod types;

// Re-export main types
pub use builder::{is_empty_context, PromptSet, PromptVars};
pub use loader::load_overrides;
pub use templates::{BLOCK_SEPARATOR, MAX_HISTORY, NO_CONTEXT_SENTINEL};
pub use types::{BuiltPrompt, Exchange, PromptKind, PromptOverride};
