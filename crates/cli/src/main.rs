//! CDSS CLI
//!
//! Main entry point for the `cdss` command-line tool.
//! Answers clinical questions from a local guideline knowledge base.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ChatCommand, IngestCommand, ResetCommand, SourcesCommand, StatusCommand,
    SummarizeCommand,
};
use cdss_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// CDSS - clinical decision support over local guidelines
#[derive(Parser, Debug)]
#[command(name = "cdss")]
#[command(about = "Clinical decision support with retrieval-augmented answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CDSS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Completion service provider
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a clinical question
    Ask(AskCommand),

    /// Interactive follow-up questions
    Chat(ChatCommand),

    /// Add documents to the knowledge base
    Ingest(IngestCommand),

    /// List ingested sources
    Sources(SourcesCommand),

    /// Check the completion service and the index
    Status(StatusCommand),

    /// Summarize one source
    Summarize(SummarizeCommand),

    /// Remove one source or everything from the index
    Reset(ResetCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Ingest(_) => "ingest",
            Commands::Sources(_) => "sources",
            Commands::Status(_) => "status",
            Commands::Summarize(_) => "summarize",
            Commands::Reset(_) => "reset",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file, then environment
    let config = AppConfig::load(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.validate()?;

    tracing::info!("CDSS CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.llm.provider);
    tracing::debug!("Model: {}", config.llm.model);

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Sources(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Summarize(cmd) => cmd.execute(&config).await,
        Commands::Reset(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
