//! # repo-qa CLI (`rqa`)
//!
//! Index a source-code repository and ask grounded questions about it.
//!
//! ## Usage
//!
//! ```bash
//! rqa --config ./config/rqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rqa init` | Create the SQLite database and run schema migrations |
//! | `rqa ingest <url>` | Clone a GitHub repository and index it |
//! | `rqa ingest --path <dir>` | Index a local checkout |
//! | `rqa ask <repo_id> "<question>"` | Answer a question from an indexed repository |
//! | `rqa serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! rqa init
//! rqa ingest https://github.com/owner/project
//! rqa ask 3f2a…c9 "How does authentication work?" --variant filtered
//! rqa serve
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`). Command results are
//! printed to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_qa::config;
use repo_qa::migrate;
use repo_qa::server;
use repo_qa::service::RagService;

/// repo-qa: retrieval-augmented question answering over code repositories.
#[derive(Parser)]
#[command(
    name = "rqa",
    about = "Ask grounded, cited questions about a source-code repository",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index a repository.
    ///
    /// Clones a GitHub URL (using `GITHUB_TOKEN` when set) or scans a local
    /// directory given with `--path`.
    Ingest {
        /// GitHub repository URL (`https://github.com/<owner>/<repo>`).
        #[arg(required_unless_present = "path", conflicts_with = "path")]
        url: Option<String>,

        /// Local checkout to index instead of cloning.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Ask a question about an indexed repository.
    Ask {
        /// Repository id printed by `rqa ingest`.
        repo_id: String,

        /// Natural-language question.
        question: String,

        /// Retrieval policy: `base` or `filtered`.
        #[arg(long, default_value = "base")]
        variant: String,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server.
    Serve,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { url, path } => {
            let service = RagService::from_config(&cfg).await?;
            let report = match (url, path) {
                (_, Some(path)) => service.ingest_path(&path).await?,
                (Some(url), None) => {
                    let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
                    service.ingest_url(&url, token).await?
                }
                (None, None) => anyhow::bail!("either a URL or --path is required"),
            };
            println!("ingest {}", report.repository_id);
            println!("  files: {}", report.files_seen);
            println!("  files skipped: {}", report.files_skipped);
            println!("  chunks written: {}", report.total_chunks);
            if report.zero_vector_chunks > 0 {
                println!("  zero-vector chunks: {}", report.zero_vector_chunks);
            }
            println!("ok");
        }
        Commands::Ask {
            repo_id,
            question,
            variant,
            json,
        } => {
            let service = RagService::from_config(&cfg).await?;
            let result = service.ask(&repo_id, &question, &variant).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer.trim_end());
                println!();
                println!(
                    "context_relevance: {}  groundedness: {}  chunks: {}",
                    result.metrics.context_relevance,
                    result.metrics.groundedness,
                    result.metrics.num_chunks_retrieved
                );
                for (i, s) in result.sources.iter().enumerate() {
                    println!("  {}. {} (distance {:.4})", i + 1, s.file_path, s.distance);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
