//! # Newsdesk CLI
//!
//! The `newsdesk` binary manages the article store and runs the HTTP API.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `newsdesk init` | Create the SQLite article database |
//! | `newsdesk ingest <file>` | Embed and store articles from a JSONL file |
//! | `newsdesk search "<query>"` | Run the retrieval pipeline from the CLI |
//! | `newsdesk serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! newsdesk init --config ./config/newsdesk.toml
//!
//! # Ingest a day's crawl
//! newsdesk ingest crawl/2024-03-01.jsonl
//!
//! # Debug retrieval without the HTTP layer
//! newsdesk search "AI funding news since 2024-01-01"
//!
//! # Serve the API (requires the shared secret)
//! NEWSDESK_API_KEY=secret newsdesk serve
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newsdesk::config;
use newsdesk::db;
use newsdesk::embedding::{Embedder, RemoteEmbedder};
use newsdesk::index::{SqliteIndex, VectorIndex};
use newsdesk::ingest;
use newsdesk::intent::IntentExtractor;
use newsdesk::llm::{create_chat_model, ChatModel};
use newsdesk::migrate;
use newsdesk::models::ChatMessage;
use newsdesk::retrieve::Retriever;
use newsdesk::server;

/// Newsdesk — a retrieval-augmented news chat backend with cited answers.
#[derive(Parser)]
#[command(
    name = "newsdesk",
    about = "Newsdesk — a retrieval-augmented news chat backend with cited answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/newsdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the article database schema.
    ///
    /// Creates the SQLite database file and the articles table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Embed and store articles from a newline-delimited JSON file.
    ///
    /// Each line is one article object: `{"title", "url", "date"?}`.
    /// Articles already stored (same title and URL) are skipped.
    Ingest {
        /// Path to the `.jsonl` articles file.
        file: PathBuf,

        /// Override the embedding batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Run the retrieval pipeline for a one-off query.
    ///
    /// Extracts intent (including date bounds) from the query, searches the
    /// index, and prints the ranked articles. Useful for debugging what the
    /// HTTP API would retrieve.
    Search {
        /// The question to retrieve articles for.
        query: String,

        /// Maximum number of articles to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the HTTP API.
    ///
    /// Binds to the address configured in `[server].bind`. Requires the
    /// NEWSDESK_API_KEY environment variable; clients authenticate with the
    /// `x-api-key` header.
    Serve,
}

fn init_logging(logs_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdesk=info"));

    match logs_dir {
        // serve: daily-rolling system log file, mirroring the chat log layout
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "system_log.txt");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    // Hold the appender guard for the life of the process.
    let _log_guard = match &cli.command {
        Commands::Serve => init_logging(Some(&cfg.logs.dir)),
        _ => init_logging(None),
    };

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, batch_size } => {
            let index = open_index(&cfg).await?;
            let batch = batch_size.unwrap_or(cfg.embedding.batch_size);
            let (parsed, inserted) = ingest::run_ingest(index.clone(), &file, batch).await?;
            let total = index.count().await?;
            println!(
                "parsed articles: {}\ninserted articles: {}\ntotal indexed: {}\nok",
                parsed, inserted, total
            );
        }
        Commands::Search { query, limit } => {
            let index = open_index(&cfg).await?;
            let model: Arc<dyn ChatModel> = Arc::from(create_chat_model(&cfg.llm)?);
            let retriever = Retriever::new(
                IntentExtractor::new(model),
                index,
                limit.unwrap_or(cfg.retrieval.top_k),
            );

            let articles = retriever.retrieve(&[ChatMessage::user(query)]).await?;

            if articles.is_empty() {
                println!("No results.");
            } else {
                for (i, article) in articles.iter().enumerate() {
                    println!("{}. {}", i + 1, article.title);
                    println!("    date: {}", article.date);
                    println!("    url: {}", article.url);
                    println!();
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn open_index(cfg: &config::Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(cfg.embedding.clone()));
    Ok(Arc::new(SqliteIndex::new(pool, embedder)))
}
