//! # table-rag CLI (`trag`)
//!
//! ## Usage
//!
//! ```bash
//! trag --config ./config/trag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trag build` | Ingest every archive under the root and write the index |
//! | `trag stats` | Summarize the persisted index |
//! | `trag show <document_id>` | Print the nodes of one document |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (e.g. `RUST_LOG=table_rag=debug`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use table_rag::config::{self, Config};
use table_rag::ingest::{build_index, BuildOptions};
use table_rag::{show, stats};

/// table-rag CLI: turn document archives into page-aware retrieval nodes.
#[derive(Parser)]
#[command(
    name = "trag",
    about = "table-rag: ingest table-heavy document archives into a retrieval index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/trag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from every archive under the root directory.
    ///
    /// Replaces any snapshot already in the index directory.
    Build {
        /// Override `[build].root`.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Override `[index].persist_dir`.
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },

    /// Show node counts for the persisted index.
    Stats {
        /// Override `[index].persist_dir`.
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },

    /// Print the nodes of one document.
    Show {
        /// Document id (archive file name without extension).
        document_id: String,

        /// Blank table node text the way retrieval does.
        #[arg(long)]
        blank_tables: bool,

        /// Render the table QA prompt for this query over the document's nodes.
        #[arg(long)]
        query: Option<String>,

        /// Override `[index].persist_dir`.
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
}

fn index_dir(cfg: &Config, flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag.or_else(|| cfg.index.persist_dir.clone()) {
        Some(dir) => Ok(dir),
        None => bail!("no index directory: set [index].persist_dir or pass --index-dir"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { root, index_dir: dir } => {
            let mut options = BuildOptions::from_config(&cfg);
            if root.is_some() {
                options.root = root;
            }
            options.index_path = Some(index_dir(&cfg, dir)?);
            let index_path = options.index_path.clone();

            let report = build_index(options).await.context("index build failed")?;

            println!("build complete");
            if let Some(dir) = index_path {
                println!("  index:             {}", dir.display());
            }
            println!("  archives found:    {}", report.archives_found);
            println!("  archives indexed:  {}", report.archives_indexed);
            println!("  archives skipped:  {}", report.archives_skipped);
            println!("  pages skipped:     {}", report.pages_skipped);
            println!("  nodes:             {}", report.nodes);
            println!("    tables:          {}", report.tables);
            println!("    text chunks:     {}", report.text_chunks);
            println!("    images:          {}", report.images);
        }
        Commands::Stats { index_dir: dir } => {
            stats::run_stats(&index_dir(&cfg, dir)?).await?;
        }
        Commands::Show {
            document_id,
            blank_tables,
            query,
            index_dir: dir,
        } => {
            show::run_show(&index_dir(&cfg, dir)?, &document_id, blank_tables, query.as_deref())
                .await?;
        }
    }

    Ok(())
}
