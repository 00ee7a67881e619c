//! # Paperdesk CLI (`paperdesk`)
//!
//! ## Usage
//!
//! ```bash
//! paperdesk --config ./config/paperdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `paperdesk init` | Create the SQLite database and schema |
//! | `paperdesk fetch "<topics>"` | Fetch papers for comma-separated topics through the cache |
//! | `paperdesk topics` | List stored topics with document counts |
//! | `paperdesk documents <topic>` | List a topic's documents |
//! | `paperdesk ask "<query>" --topic <topic>` | Answer a question from a topic's documents |
//! | `paperdesk export <topic> [path]` | Write a topic's documents as JSON |
//! | `paperdesk import <file> --topic <topic>` | Load a JSON interchange file |
//! | `paperdesk serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! paperdesk init
//! paperdesk fetch "deep learning, reinforcement learning" --count 20
//! paperdesk ask "What limits scaling?" --topic "deep learning"
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paperdesk::ask::{self, AskOptions};
use paperdesk::{config, export, fetch, migrate, server, topics};

/// Paperdesk: fetch arXiv papers by topic and ask questions over them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "paperdesk",
    about = "Paperdesk: a research assistant over cached arXiv papers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/paperdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Fetch papers for one or more topics.
    ///
    /// Topics already fetched within `[cache] fetch_interval_secs` are served
    /// from the cache; only missing documents are requested.
    Fetch {
        /// Comma-separated topics, e.g. "deep learning, robotics".
        topics: String,

        /// Number of documents wanted per topic (1 to 200).
        #[arg(long, default_value_t = fetch::DEFAULT_COUNT, value_parser = parse_count)]
        count: usize,

        /// Ignore the cache and fetch everything again.
        #[arg(long)]
        force: bool,
    },

    /// List stored topics.
    Topics,

    /// List the documents stored under a topic.
    Documents {
        /// Topic name or a fragment of it.
        topic: String,
    },

    /// Answer a question from a topic's documents.
    Ask {
        query: String,

        /// Topic name or a fragment of it.
        #[arg(long)]
        topic: String,

        /// Number of documents to retrieve (default from config).
        #[arg(long)]
        top_k: Option<usize>,

        /// Generation model override.
        #[arg(long)]
        model: Option<String>,

        /// Maximum answer length in tokens.
        #[arg(long)]
        max_length: Option<usize>,

        /// Beam count for providers that support it.
        #[arg(long)]
        num_beams: Option<usize>,
    },

    /// Export a topic's documents as JSON.
    Export {
        topic: String,

        /// Output file, or `-` for stdout.
        /// Defaults to `data/raw/arxiv_<topic>_documents.json`.
        output: Option<PathBuf>,
    },

    /// Import a JSON interchange file under a topic.
    Import {
        file: PathBuf,

        #[arg(long)]
        topic: String,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

fn parse_count(s: &str) -> Result<usize, String> {
    let count: usize = s.parse().map_err(|e| format!("{}", e))?;
    fetch::check_count(count).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
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
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Fetch {
            topics,
            count,
            force,
        } => {
            fetch::run_fetch(&cfg, &topics, count, force).await?;
        }
        Commands::Topics => {
            topics::run_topics(&cfg).await?;
        }
        Commands::Documents { topic } => {
            topics::run_documents(&cfg, &topic).await?;
        }
        Commands::Ask {
            query,
            topic,
            top_k,
            model,
            max_length,
            num_beams,
        } => {
            let options = AskOptions {
                top_k,
                model,
                max_length,
                num_beams,
            };
            ask::run_ask(&cfg, &query, &topic, options).await?;
        }
        Commands::Export { topic, output } => {
            export::run_export(&cfg, &topic, output.as_deref()).await?;
        }
        Commands::Import { file, topic } => {
            export::run_import(&cfg, &file, &topic).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
