//! apiforge CLI — the main entry point.
//!
//! Commands:
//! - *(none)*  — Run the configured default request once
//! - `run`     — Run one request from `--message` or `--file`
//! - `ingest`  — Store source files in similarity memory
//! - `feedback` — Record a human correction
//! - `memory`  — Search or inspect similarity memory
//! - `init`    — Write a default `apiforge.toml`
//! - `doctor`  — Diagnose configuration and workspace

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "apiforge",
    about = "apiforge — retrieval-augmented API code generation agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "APIFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on one request
    Run {
        /// The request text
        #[arg(short, long, conflicts_with = "file")]
        message: Option<String>,

        /// Read the request from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Store source files (relative to the workspace root) in memory
    Ingest {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Record a human correction for a past answer
    Feedback {
        /// The original request
        #[arg(short, long)]
        question: String,

        /// The answer that was wrong
        #[arg(short, long)]
        wrong: String,

        /// The correct answer
        #[arg(short, long, conflicts_with = "correct_file")]
        correct: Option<String>,

        /// Read the correct answer from a file
        #[arg(long)]
        correct_file: Option<PathBuf>,
    },

    /// Inspect similarity memory
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and workspace
    Doctor,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Show the records most similar to a query
    Search {
        query: String,

        /// Number of results
        #[arg(short = 'k', long, default_value_t = 3)]
        limit: usize,
    },

    /// Show store location and record counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        None => commands::run::run(config_path, None, None).await?,
        Some(Commands::Run { message, file }) => {
            commands::run::run(config_path, message, file).await?
        }
        Some(Commands::Ingest { files }) => commands::ingest::run(config_path, &files).await?,
        Some(Commands::Feedback {
            question,
            wrong,
            correct,
            correct_file,
        }) => commands::feedback::run(config_path, &question, &wrong, correct, correct_file).await?,
        Some(Commands::Memory { command }) => match command {
            MemoryCommands::Search { query, limit } => {
                commands::memory::search(config_path, &query, limit).await?
            }
            MemoryCommands::Stats => commands::memory::stats(config_path).await?,
        },
        Some(Commands::Init { force }) => commands::init::run(config_path, force)?,
        Some(Commands::Doctor) => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
