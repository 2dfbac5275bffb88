//! # Workflow Catalog CLI (`wfc`)
//!
//! ## Usage
//!
//! ```bash
//! wfc --config ./config/wfc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wfc init` | Create the SQLite database and run schema migrations |
//! | `wfc import` | Import a tree of workflow documents |
//! | `wfc stats` | Print catalog totals and the per-category breakdown |
//! | `wfc show <origin-path>` | Print one stored workflow as JSON |
//!
//! `wfc import` exits 0 even when individual documents fail; it exits
//! non-zero only when configuration, discovery, or collection bootstrap fails.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workflow_catalog::config;
use workflow_catalog::ingest::{self, ImportOptions};
use workflow_catalog::migrate;
use workflow_catalog::progress::ProgressMode;
use workflow_catalog::report;
use workflow_catalog::show;

/// Workflow Catalog CLI: import workflow-definition documents into a
/// classified, deduplicated catalog.
#[derive(Parser)]
#[command(
    name = "wfc",
    about = "Workflow Catalog: import workflow-definition documents into a queryable catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wfc.toml")]
    config: PathBuf,

    /// Log level filter (e.g. debug, info, warn). `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import every workflow document under a root directory.
    ///
    /// Documents are processed in fixed-size batches; items inside a batch
    /// run concurrently. Re-importing the same tree updates existing
    /// records instead of duplicating them.
    Import {
        /// Root directory to scan. Overrides `import.root`.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Documents per batch. Overrides `import.batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Target collection slug. Overrides `import.collection`.
        #[arg(long)]
        collection: Option<String>,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Read and classify only; write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print catalog totals and the per-category breakdown.
    Stats {
        /// Collection slug. Defaults to `import.collection`.
        #[arg(long)]
        collection: Option<String>,
    },

    /// Print one stored workflow by origin path.
    Show {
        /// Path relative to the import root, e.g. `Communication/slack.json`.
        origin_path: String,

        /// Collection slug. Defaults to `import.collection`.
        #[arg(long)]
        collection: Option<String>,
    },
}

fn init_logging(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            root,
            batch_size,
            collection,
            limit,
            dry_run,
            progress,
        } => {
            let mut import = cfg.import.clone();
            if let Some(size) = batch_size {
                anyhow::ensure!(size > 0, "--batch-size must be > 0");
                import.batch_size = size;
            }
            if let Some(slug) = collection {
                import.collection = slug;
            }
            let root = root
                .or_else(|| import.root.clone())
                .context("No import root: pass --root or set import.root in the config")?;

            let options = ImportOptions {
                root,
                import,
                limit,
                dry_run,
            };
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_import_cmd(&cfg, &options, progress).await?;
        }
        Commands::Stats { collection } => {
            let slug = collection.unwrap_or_else(|| cfg.import.collection.clone());
            report::run_stats(&cfg, &slug).await?;
        }
        Commands::Show {
            origin_path,
            collection,
        } => {
            let slug = collection.unwrap_or_else(|| cfg.import.collection.clone());
            show::run_show(&cfg, &slug, &origin_path).await?;
        }
    }

    Ok(())
}
