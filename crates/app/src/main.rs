use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
#[cfg(not(feature = "fastembed"))]
use notes_search_core::HashNgramEmbedder;
use notes_search_core::{
    AppleScriptNoteSource, Embedder, HtmlNormalizer, HybridSearchEngine, IndexingPipeline,
    SqliteStore, DEFAULT_FETCH_CONCURRENCY, DEFAULT_SEARCH_LIMIT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod rpc;
mod tools;

use tools::NotesService;

#[derive(Parser)]
#[command(name = "notes-search-mcp", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the index database. Defaults to ~/.notes-search.
    #[arg(long, env = "NOTES_SEARCH_DB_DIR")]
    db_dir: Option<PathBuf>,

    /// Name of the index table.
    #[arg(long, env = "NOTES_SEARCH_TABLE", default_value = "notes")]
    table: String,

    /// Maximum concurrent note fetches while indexing.
    #[arg(long, default_value_t = DEFAULT_FETCH_CONCURRENCY)]
    fetch_concurrency: usize,

    /// Default number of search results.
    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    search_limit: usize,

    /// Path to the osascript binary.
    #[arg(long, default_value = "osascript")]
    osascript: String,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the notes tools to an MCP client over stdio.
    Serve,
    /// Rebuild the search index from Apple Notes and print the report.
    Index,
    /// Search the index from the command line.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let db_dir = cli.db_dir.clone().unwrap_or_else(default_db_dir);
    let embedder = build_embedder(&db_dir)?;

    let store = SqliteStore::open(&db_dir, &cli.table, embedder)
        .with_context(|| format!("opening index store in {}", db_dir.display()))?;
    let store = Arc::new(RwLock::new(store));

    let source = Arc::new(AppleScriptNoteSource::new(&cli.osascript));
    let pipeline = IndexingPipeline::new(
        Arc::clone(&source),
        Arc::clone(&store),
        HtmlNormalizer,
        cli.fetch_concurrency,
    );
    let engine = HybridSearchEngine::new(Arc::clone(&store));
    let service = NotesService::new(source, pipeline, engine, cli.search_limit);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        db_dir = %db_dir.display(),
        table = %cli.table,
        "notes-search-mcp boot"
    );

    match cli.command {
        Command::Serve => rpc::serve(&service).await?,
        Command::Index => match service.run_index().await {
            Ok(report) => println!("{}", report.render()),
            Err(error) => anyhow::bail!("indexing failed: {error}"),
        },
        Command::Search { query, limit } => {
            let hits = service.run_search(&query, limit).await;
            println!("{}", tools::render_hits(&query, &hits));
        }
    }

    Ok(())
}

fn default_db_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".notes-search"),
        None => PathBuf::from(".notes-search"),
    }
}

#[cfg(feature = "fastembed")]
fn build_embedder(db_dir: &Path) -> anyhow::Result<Arc<dyn Embedder>> {
    let embedder = notes_search_core::FastembedEmbedder::try_new(&db_dir.join("models"), false)
        .context("initializing the embedding model")?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "fastembed"))]
fn build_embedder(_db_dir: &Path) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(Arc::new(HashNgramEmbedder::default()))
}
