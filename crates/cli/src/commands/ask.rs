//! Ask command handler.
//!
//! Answers one question from the knowledge base, streaming by default.

use super::{print_json, print_sources};
use cdss_core::{config::AppConfig, AppError, AppResult};
use cdss_knowledge::{KnowledgeBase, QueryEvent, SourceCitation};
use clap::Args;
use futures::StreamExt;
use std::io::Write;

/// Ask a clinical question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Only search this source
    #[arg(short, long)]
    pub source: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Drop chunks below this similarity (-1.0 to 1.0)
    #[arg(long)]
    pub min_similarity: Option<f32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Wait for the complete answer
    #[arg(long)]
    pub no_stream: bool,

    /// Output the full result as JSON (implies --no-stream)
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let config = self.apply(config);
        config.validate()?;

        let base = KnowledgeBase::open(&config).await?;
        let pipeline = base.pipeline(&config)?;

        if self.json || self.no_stream {
            let result = pipeline.query(&self.question, self.source.as_deref()).await?;
            if self.json {
                return print_json(&result);
            }
            println!("{}", result.answer);
            print_sources(&result.sources);
            return Ok(());
        }

        let mut events = pipeline
            .query_stream(&self.question, self.source.as_deref())
            .await?;
        let mut sources: Vec<SourceCitation> = Vec::new();
        let mut stdout = std::io::stdout();

        while let Some(event) = events.next().await {
            match event {
                QueryEvent::Sources(found) => sources = found,
                QueryEvent::AnswerChunk(fragment) => {
                    print!("{}", fragment);
                    stdout.flush().ok();
                }
                QueryEvent::Done => {
                    println!();
                    print_sources(&sources);
                }
                QueryEvent::Error(message) if sources.is_empty() => {
                    // Nothing relevant was retrieved
                    println!("{}", message);
                }
                QueryEvent::Error(message) => {
                    println!();
                    return Err(AppError::Generation(message));
                }
            }
        }

        Ok(())
    }

    /// Fold the per-question flags into a copy of the configuration.
    fn apply(&self, config: &AppConfig) -> AppConfig {
        let mut config = config.clone();
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(min_similarity) = self.min_similarity {
            config.retrieval.min_similarity = min_similarity;
        }
        if let Some(temperature) = self.temperature {
            config.generation.temperature = temperature;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        ask: AskCommand,
    }

    #[test]
    fn test_flags_override_config() {
        let harness = Harness::parse_from([
            "cdss",
            "What is PVS1?",
            "--top-k",
            "2",
            "--min-similarity",
            "0.4",
            "--temperature",
            "0.1",
        ]);
        let config = harness.ask.apply(&AppConfig::default());

        assert_eq!(harness.ask.question, "What is PVS1?");
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.retrieval.min_similarity, 0.4);
        assert_eq!(config.generation.temperature, 0.1);
        assert!(!harness.ask.no_stream);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let harness = Harness::parse_from(["cdss", "question"]);
        let defaults = AppConfig::default();
        let config = harness.ask.apply(&defaults);
        assert_eq!(config.retrieval.top_k, defaults.retrieval.top_k);
        assert_eq!(config.generation.temperature, defaults.generation.temperature);
    }
}
