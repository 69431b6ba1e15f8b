//! # techpub CLI (`tpub`)
//!
//! The `tpub` binary drives the ingestion pipeline and the read API.
//!
//! ## Usage
//!
//! ```bash
//! tpub --config ./config/techpub.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tpub init` | Create the SQLite database and run schema migrations |
//! | `tpub ingest <dir>` | Ingest one publication directory |
//! | `tpub tree <code>` | Print a publication's cached tree snapshot |
//! | `tpub get <id>` | Print one node with its display record |
//! | `tpub serve` | Start the read-only HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use techpub::{config, db, ingest, migrate, server, tree_cmd};

/// techpub — ingests S1000D-style technical publications into a
/// SQLite-backed content tree.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/techpub.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tpub",
    about = "techpub — technical publication ingestion and tree materialization",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/techpub.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (publications, nodes, node_links, staging_modules). This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Ingest one publication directory.
    ///
    /// The directory must hold exactly one structure document (`PMC-*`),
    /// the content documents it references (`DMC-*`), and optionally a
    /// media subdirectory of image assets. Each run creates a fresh
    /// publication; partial trees are never persisted.
    Ingest {
        /// Path to the publication source directory.
        dir: PathBuf,
    },

    /// Print a publication's cached tree snapshot by business code.
    Tree {
        /// The publication's hyphen-joined business code.
        code: String,
    },

    /// Print one tree node by numeric id.
    Get {
        /// Node id as found in the tree snapshot.
        id: i64,
    },

    /// Start the read-only HTTP API.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// publication and node lookups over the materialized data.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dir } => {
            // Schema must exist before the first ingest; applying it here
            // keeps `init` optional for scripted use.
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            pool.close().await;
            ingest::run_ingest(&cfg, &dir).await?;
        }
        Commands::Tree { code } => {
            tree_cmd::run_tree(&cfg, &code).await?;
        }
        Commands::Get { id } => {
            tree_cmd::run_get(&cfg, id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
