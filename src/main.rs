//! # Lector CLI (`lector`)
//!
//! Index documents and ask questions about them from the command line, or
//! start the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! lector --config ./config/lector.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lector index <FILE>` | Store, chunk, embed and index a PDF or text file |
//! | `lector reindex <ID>` | Rebuild an index from the stored text |
//! | `lector retrieve <ID> "<question>"` | Show the best-matching chunks |
//! | `lector ask <ID> "<question>"` | Answer a question from a document |
//! | `lector serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Preview chunk boundaries without calling any provider
//! lector index ./paper.pdf --dry-run
//!
//! # Index under a chosen id, then ask about it
//! lector index ./paper.pdf --id paper
//! lector ask paper "What dataset was used?" --k 6
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use lector::commands;
use lector::config::{self, Config};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Lector: question answering over your documents.
#[derive(Parser)]
#[command(
    name = "lector",
    about = "Lector: retrieval-augmented question answering over uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lector.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store and index a PDF or plain-text file.
    Index {
        /// File to index; `.pdf` files go through PDF extraction.
        file: PathBuf,

        /// Document id to use instead of a generated UUID.
        #[arg(long)]
        id: Option<String>,

        /// Print chunk boundaries only; no providers, no writes.
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild a document's index from its stored text.
    Reindex {
        /// Document id.
        id: String,
    },

    /// Show the chunks that best match a question.
    Retrieve {
        /// Document id.
        id: String,
        /// The question.
        question: String,
        /// Number of chunks (defaults to `[retrieval] k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question about a document.
    Ask {
        /// Document id.
        id: String,
        /// The question.
        question: String,
        /// Number of chunks to retrieve (defaults to `[retrieval] k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A dry run works without a config file; defaults stand in for it.
fn load_for_dry_run(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.command {
        Commands::Index { dry_run: true, .. } => load_for_dry_run(&cli.config)?,
        _ => config::load_config(&cli.config)?,
    };
    init_tracing(&cfg.logging.level, cli.verbose);

    match cli.command {
        Commands::Index { file, id, dry_run } => {
            commands::run_index(&cfg, &file, id, dry_run).await?;
        }
        Commands::Reindex { id } => {
            commands::run_reindex(&cfg, &id).await?;
        }
        Commands::Retrieve { id, question, k } => {
            commands::run_retrieve(&cfg, &id, &question, k).await?;
        }
        Commands::Ask { id, question, k } => {
            commands::run_ask(&cfg, &id, &question, k).await?;
        }
        Commands::Serve => {
            lector::server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
