//! Command handlers for the CDSS CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod index;
pub mod ingest;
pub mod summarize;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use index::{ResetCommand, SourcesCommand, StatusCommand};
pub use ingest::IngestCommand;
pub use summarize::SummarizeCommand;

use cdss_core::{AppError, AppResult};
use cdss_knowledge::SourceCitation;
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

pub(crate) fn print_sources(sources: &[SourceCitation]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  [{}] {} (chunk {}, relevance: {:.2})",
            i + 1,
            source.source_id,
            source.position,
            source.similarity
        );
    }
}
