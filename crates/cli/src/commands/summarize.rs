//! Summarize command handler.

use super::{print_json, print_sources};
use cdss_core::{config::AppConfig, AppResult};
use cdss_knowledge::KnowledgeBase;
use clap::Args;

/// Summarize one source
#[derive(Args, Debug)]
pub struct SummarizeCommand {
    /// Source id, as listed by 'cdss sources'
    pub source: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SummarizeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing summarize command for '{}'", self.source);

        let base = KnowledgeBase::open(config).await?;
        let result = base.pipeline(config)?.summarize(&self.source).await?;

        if self.json {
            return print_json(&result);
        }
        println!("{}", result.answer);
        print_sources(&result.sources);
        Ok(())
    }
}
