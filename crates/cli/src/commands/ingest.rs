//! Ingest command handler.

use super::print_json;
use cdss_core::{config::AppConfig, AppResult};
use cdss_knowledge::{IngestOptions, KnowledgeBase};
use clap::Args;
use std::path::PathBuf;

/// Add documents to the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Replace sources that are already ingested
    #[arg(long)]
    pub reingest: bool,

    /// Also strip page markers and headers
    #[arg(long)]
    pub aggressive_clean: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} path(s)", self.paths.len());

        let base = KnowledgeBase::open(config).await?;
        let options = IngestOptions {
            aggressive_clean: self.aggressive_clean,
            ..IngestOptions::from(config)
        };
        let stats = base
            .ingestor(options)
            .ingest_paths(&self.paths, self.reingest)
            .await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Ingested {} of {} files ({} chunks, {} skipped, {} failed) in {:.2}s",
                stats.ingested,
                stats.files_total,
                stats.chunks,
                stats.skipped,
                stats.failed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
