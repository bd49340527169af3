//! # ragchat CLI
//!
//! Ask questions against a local knowledge store, answered by a chat model
//! with the most relevant records as context.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat init` | Create the SQLite database and run schema migrations |
//! | `ragchat ingest <connector>` | Ingest `faq`, `docs`, or `commits` |
//! | `ragchat search "<query>"` | Show the records a question retrieves |
//! | `ragchat ask "<query>"` | Answer one question and exit |
//! | `ragchat chat` | Interactive question/answer loop |
//! | `ragchat stats` | Record counts for the configured collection |
//!
//! ## Examples
//!
//! ```bash
//! ragchat init
//! ragchat ingest faq
//! ragchat search "Is GitHub free?" --k 3
//! ragchat chat
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragchat::{chat, config, ingest, logging, migrate, search, stats};

/// ragchat: retrieval-augmented question answering over a local store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Retrieval-augmented question answering over a local knowledge store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragchat.toml`.
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    /// Enable debug logging on stderr. `RAGCHAT_LOG` overrides this.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the `records` table, and its FTS5
    /// index. Running it again is safe.
    Init,

    /// Ingest records from a connector.
    ///
    /// Records whose id the store already holds are left untouched, so
    /// re-running an ingest inserts nothing new.
    Ingest {
        /// Connector name: `faq`, `docs`, or `commits`.
        connector: String,

        /// Show item counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the records a query retrieves, without calling the model.
    Search {
        /// The search query string.
        query: String,

        /// Number of results. Defaults to `retrieval.top_k`.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a single question and exit.
    Ask {
        /// The question.
        query: String,
    },

    /// Start an interactive session.
    ///
    /// Reads one question per line. An empty line ends the session.
    Chat,

    /// Show record counts for the configured collection.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { connector, dry_run } => {
            ingest::run_ingest(&cfg, &connector, dry_run).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Ask { query } => {
            chat::run_ask(&cfg, &query).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
