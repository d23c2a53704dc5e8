//! Chat command handler.
//!
//! Line-oriented question loop where each answer can build on the previous
//! exchanges.

use super::print_sources;
use cdss_core::{config::AppConfig, AppResult};
use cdss_knowledge::KnowledgeBase;
use cdss_prompt::{Exchange, MAX_HISTORY};
use clap::Args;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive follow-up questions
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Only search this source
    #[arg(short, long)]
    pub source: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let base = KnowledgeBase::open(config).await?;
        let pipeline = base.pipeline(config)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut history: Vec<Exchange> = Vec::new();

        eprintln!("Ask a question (empty line to quit).");
        loop {
            eprint!("> ");
            std::io::stderr().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();
            if question.is_empty() {
                break;
            }

            let result = if history.is_empty() {
                pipeline.query(question, self.source.as_deref()).await?
            } else {
                pipeline
                    .follow_up(question, &history, self.source.as_deref())
                    .await?
            };

            println!("{}", result.answer);
            print_sources(&result.sources);
            println!();

            remember(&mut history, Exchange::new(question, result.answer));
        }

        Ok(())
    }
}

/// Append an exchange, keeping only the most recent ones.
fn remember(history: &mut Vec<Exchange>, exchange: Exchange) {
    history.push(exchange);
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}
