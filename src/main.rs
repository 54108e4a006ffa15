//! # docrag CLI
//!
//! The `docrag` binary runs the HTTP server and exposes the same pipelines
//! from the command line.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag serve` | Start the HTTP server |
//! | `docrag ingest <files>...` | Extract, embed and index local files (replaces the snapshot) |
//! | `docrag ingest --append <files>...` | Add local files to the existing snapshot |
//! | `docrag query "<question>"` | Answer a question from the indexed documents |
//! | `docrag compare <field>...` | Print the comparison table for the given fields |
//! | `docrag stats` | Summarise the current snapshot |
//!
//! ## Examples
//!
//! ```bash
//! docrag ingest reports/q1.pdf reports/q2.pdf scans/receipt.png
//! docrag query "What was the net revenue in Q2?"
//! docrag compare Revenue "Operating costs" Risk
//! docrag serve --config ./config/docrag.toml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docrag::config;
use docrag::models::UploadedFile;
use docrag::server::{self, AppState};
use docrag::{logging, stats};

/// docrag: question answering and field comparison over PDFs and images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "Retrieval-augmented question answering over PDFs and images",
    version,
    long_about = "docrag extracts text, tables and OCR output from PDFs and images, embeds it \
    into a vector index, and answers questions or compares fields across the indexed documents \
    via a CLI and an HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docrag.toml`. Storage, server, embedding,
    /// generation, retrieval and extraction settings are read from it.
    #[arg(long, global = true, default_value = "./config/docrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Ingest local PDF and image files.
    ///
    /// Files are copied into `[storage].upload_dir` and processed exactly
    /// like an upload to `POST /ingest`.
    Ingest {
        /// Files to ingest (.pdf, .png, .jpg, .jpeg).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Add to the existing snapshot instead of replacing it.
        #[arg(long)]
        append: bool,
    },

    /// Answer a question from the indexed documents.
    Query {
        /// The question.
        query: String,
    },

    /// Compare fields across the indexed documents.
    Compare {
        /// Field names, each used as its own retrieval query.
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Show row count, dimensions and per-source breakdown of the snapshot.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { files, append } => {
            let state = AppState::from_config(&cfg)?;
            let uploads = read_files(&files).await?;
            let outcome = if append {
                state.ingest.append(uploads).await?
            } else {
                state.ingest.ingest(uploads).await?
            };
            println!("{}", outcome.message());
        }
        Commands::Query { query } => {
            let state = AppState::from_config(&cfg)?;
            println!("{}", state.query.answer(&query).await?);
        }
        Commands::Compare { fields } => {
            let state = AppState::from_config(&cfg)?;
            print!("{}", state.compare.compare(&fields).await?);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn read_files(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile { name, bytes });
    }
    Ok(files)
}
