//! # vaultqa CLI (`vqa`)
//!
//! Answers questions from a local markdown vault, and exposes the same
//! pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! vqa --config ./config/vqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vqa index` | Scan the vault, build the index, print stats and warnings |
//! | `vqa ask "<q>"` | Answer a question, formatter included |
//! | `vqa search "<q>"` | Print ranked sections |
//! | `vqa classify "<q>"` | Print how a query is classified |
//! | `vqa extract "<q>"` | Print the extracted records without formatting |
//! | `vqa note <path>` | Print a note's sections, line ranges, and aliases |
//! | `vqa serve` | Start the HTTP server |
//!
//! Logs go to stderr; `RUST_LOG` overrides the default `info` level.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vaultqa::answer::{run_ask, Answerer};
use vaultqa::config;
use vaultqa::formatter::create_formatter;
use vaultqa::inspect::{run_classify, run_extract};
use vaultqa::note::run_note;
use vaultqa::search::run_search;
use vaultqa::server::run_server;
use vaultqa::state::IndexHandle;
use vaultqa::stats::run_index_report;

/// vaultqa: answers grounded in your markdown vault, with citations.
#[derive(Parser)]
#[command(
    name = "vqa",
    about = "vaultqa — answers grounded in a local markdown vault",
    version,
    long_about = "vaultqa indexes a markdown vault into heading sections, classifies questions, \
    retrieves the matching sections, and extracts prices, inclusions and counts deterministically. \
    A formatter may phrase the extracted facts but never adds new ones; every answer carries citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/vqa.toml`. The `VAULT_PATH` environment
    /// variable overrides `vault.root`.
    #[arg(long, global = true, default_value = "./config/vqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Scan the vault and print index statistics and warnings.
    Index,

    /// Answer a question from the vault.
    Ask {
        /// The question.
        query: String,
    },

    /// Print the sections that best match a query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print how a query is classified.
    Classify {
        query: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the records extracted for a query, without formatting.
    Extract {
        query: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print a note's sections, line ranges, and aliases.
    Note {
        /// Vault-relative path, with or without `.md`.
        path: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve {
        /// Override the bind address.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let lexicon = Arc::new(cfg.lexicon()?);

    let (handle, report) = IndexHandle::build(cfg.vault.clone(), lexicon.clone())?;
    tracing::info!(
        notes = report.notes,
        sections = report.sections,
        warnings = report.warnings.len(),
        "index built"
    );
    let snapshot = handle.snapshot();

    match cli.command {
        Commands::Index => {
            run_index_report(&cfg.vault.root, &report, &snapshot.index);
        }
        Commands::Ask { query } => {
            let formatter = create_formatter(&cfg.formatter)?;
            let answerer = Answerer::new(Arc::new(handle), formatter, cfg.retrieval.clone());
            run_ask(&answerer, &query).await?;
        }
        Commands::Search { query, limit } => {
            run_search(&snapshot.index, &query, &cfg.retrieval, &lexicon, limit);
        }
        Commands::Classify { query, json } => {
            run_classify(&snapshot.index, &lexicon, &query, json)?;
        }
        Commands::Extract { query, json } => {
            run_extract(&snapshot.index, &lexicon, &cfg.retrieval, &query, json)?;
        }
        Commands::Note { path } => {
            run_note(&snapshot.index, &path)?;
        }
        Commands::Serve { bind } => {
            let formatter = create_formatter(&cfg.formatter)?;
            let answerer = Arc::new(Answerer::new(
                Arc::new(handle),
                formatter,
                cfg.retrieval.clone(),
            ));
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            run_server(&bind, answerer).await?;
        }
    }

    Ok(())
}
