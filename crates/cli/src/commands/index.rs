//! Index inspection and maintenance commands.

use super::print_json;
use cdss_core::{config::AppConfig, AppError, AppResult};
use cdss_knowledge::KnowledgeBase;
use clap::Args;

/// List ingested sources
#[derive(Args, Debug)]
pub struct SourcesCommand {}

impl SourcesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = KnowledgeBase::open(config).await?;
        let sources = base.index().sources().await?;
        let chunks = base.index().count().await?;

        if sources.is_empty() {
            println!("No sources ingested. Run 'cdss ingest <paths>' first.");
            return Ok(());
        }
        for source in &sources {
            println!("{}", source);
        }
        println!();
        println!("{} sources, {} chunks", sources.len(), chunks);
        Ok(())
    }
}

/// Check the completion service and the index
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let base = KnowledgeBase::open(config).await?;
        let pipeline = base.pipeline(config)?;
        let status = pipeline.check_system_status().await;

        // Only asked once the service is known to answer
        let model_installed = if status.llm {
            match pipeline.generator().model_available().await {
                Ok(installed) => Some(installed),
                Err(e) => {
                    tracing::warn!("Could not list models: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if self.json {
            print_json(&serde_json::json!({
                "llm": status.llm,
                "index": status.index,
                "ready": status.ready,
                "model": config.llm.model,
                "modelInstalled": model_installed,
            }))?;
        } else {
            let mark = |ok: bool| if ok { "ok" } else { "unavailable" };
            println!("Completion service ({}): {}", config.llm.endpoint, mark(status.llm));
            match model_installed {
                Some(true) => println!("Model '{}': installed", config.llm.model),
                Some(false) => println!(
                    "Model '{}': not installed (run 'ollama pull {}')",
                    config.llm.model, config.llm.model
                ),
                None => {}
            }
            println!("Knowledge base ({}): {}", base.index().backend_name(), mark(status.index));
        }

        if status.ready {
            return Ok(());
        }
        let mut missing = Vec::new();
        if !status.llm {
            missing.push(format!(
                "start the completion service at {} with model '{}'",
                config.llm.endpoint, config.llm.model
            ));
        }
        if !status.index {
            missing.push("ingest documents with 'cdss ingest <paths>'".to_string());
        }
        Err(AppError::Config(format!("System not ready: {}", missing.join("; "))))
    }
}

/// Remove one source or everything from the index
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Only remove this source
    #[arg(short, long)]
    pub source: Option<String>,
}

impl ResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = KnowledgeBase::open(config).await?;

        match &self.source {
            Some(source) => {
                tracing::info!("Removing source '{}'", source);
                let removed = base.index().delete_by_source(source).await?;
                if removed == 0 {
                    return Err(AppError::Knowledge(format!("Unknown source: {}", source)));
                }
                println!("Removed {} chunks of '{}'", removed, source);
            }
            None => {
                tracing::info!("Clearing the knowledge base");
                let removed = base.index().clear().await?;
                println!("Removed {} chunks", removed);
            }
        }
        Ok(())
    }
}
