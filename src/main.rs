//! repolens CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use repolens::{
    chunk::Chunker,
    config::Config,
    embed::create_embedder,
    error::{Error, Result},
    meta::MetadataStore,
    retry::RetryPolicy,
    revision::GitRevisions,
    search::{print_search_hits, search},
    store::{QdrantIndex, VectorIndex},
    sync::{SyncEngine, SyncMode, SyncOptions, SyncReport},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "repolens")]
#[command(version, about = "Index git repositories into a vector store and search them", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Run one sync pass over a repository
    Sync {
        /// Path to the git repository
        repo_path: PathBuf,

        /// Collection name (defaults to the repository directory name)
        #[arg(short = 'n', long)]
        collection: Option<String>,

        /// Destroy the collection and rebuild it from scratch
        #[arg(long)]
        full: bool,

        /// Number of files processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Search an indexed collection
    Search {
        /// The search query
        query: String,

        /// Collection to search
        #[arg(short = 'n', long)]
        collection: String,

        /// Maximum number of results
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show collection and sync state
    Status {
        /// Collection to inspect
        #[arg(short = 'n', long)]
        collection: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "repolens", &mut std::io::stdout());
        }

        Commands::Init { force } => handle_init(cli.config, force)?,

        Commands::Sync {
            repo_path,
            collection,
            full,
            concurrency,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let collection = match collection {
                Some(name) => name,
                None => collection_for_repo(&repo_path)?,
            };

            let report = run_sync(&config, &repo_path, &collection, full, concurrency).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_sync_report(&collection, &report);
            }

            if let Some(err) = failure_error(&report) {
                return Err(err);
            }
        }

        Commands::Search {
            query,
            collection,
            k,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let embedder = create_embedder(&config.embedding)?;
            let index = QdrantIndex::connect(&config.qdrant_url, config.qdrant_api_key())?;
            let k = k.unwrap_or(config.query.default_k);

            let hits = search(embedder.as_ref(), &index, &collection, &query, k).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_search_hits(&query, &hits);
            }
        }

        Commands::Status { collection } => {
            let config = load_config(cli.config.as_deref())?;
            let index = QdrantIndex::connect(&config.qdrant_url, config.qdrant_api_key())?;
            let meta = MetadataStore::load(&config.state_file(&collection))?;

            match index.describe(&collection).await? {
                Some(info) => {
                    println!("Collection: {}", collection);
                    println!("  Dimension: {}", info.dimension);
                    println!("  Metric: {}", info.metric);
                    println!("  Points: {}", info.points_count);
                }
                None => println!("Collection {} does not exist", collection),
            }
            println!("  Synced files: {}", meta.len());
        }
    }

    Ok(())
}

fn handle_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let base_dir = config_path
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(Config::default_base_dir);

    let mut config = Config::default();
    let config_file = base_dir.join("config.toml");

    if config_file.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            config_file.display()
        );
        std::process::exit(1);
    }

    config.paths.base_dir = base_dir.clone();
    config.paths.config_file = config_file.clone();
    config.paths.state_dir = base_dir.join("state");
    config.save()?;

    println!("repolens initialized");
    println!("  Config: {}", config_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to customize settings");
    println!("  2. Start Qdrant: docker run -p 6334:6334 qdrant/qdrant");
    println!("  3. Sync a repository: repolens sync /path/to/repo");

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Config::load_from(None),
    }
}

/// One collection per repository, named after the repository's root
/// directory name.
fn collection_for_repo(repo_path: &Path) -> Result<String> {
    let canonical = repo_path
        .canonicalize()
        .map_err(|e| Error::NotFound(format!("{}: {}", repo_path.display(), e)))?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::Validation(format!(
                "cannot derive a collection name from {}",
                repo_path.display()
            ))
        })
}

async fn run_sync(
    config: &Config,
    repo_path: &Path,
    collection: &str,
    full: bool,
    concurrency: Option<usize>,
) -> Result<SyncReport> {
    let embedder = create_embedder(&config.embedding)?;
    let index = Arc::new(QdrantIndex::connect(
        &config.qdrant_url,
        config.qdrant_api_key(),
    )?);
    let revisions = Arc::new(GitRevisions::open(repo_path)?);
    let chunker = Chunker::from_config(&config.chunk)?;
    let retry = RetryPolicy::new(
        config.sync.max_retries,
        Duration::from_millis(config.sync.retry_base_ms),
    );

    let engine = SyncEngine::new(
        embedder,
        index,
        revisions,
        chunker,
        config.embedding.batch_size,
        retry,
    );

    let mut meta = MetadataStore::load(&config.state_file(collection))?;

    let options = SyncOptions {
        repo_root: repo_path.to_path_buf(),
        collection: collection.to_string(),
        mode: if full {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        },
        concurrency: concurrency.unwrap_or(config.sync.concurrency),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Syncing {} into {}", repo_path.display(), collection));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = engine.sync(&mut meta, &options).await;
    spinner.finish_and_clear();

    result
}

/// Any failed file makes the pass exit non-zero, so scripted runs notice
/// partial failures and re-run.
fn failure_error(report: &SyncReport) -> Option<Error> {
    if report.failures.is_empty() {
        None
    } else {
        Some(Error::Other(format!(
            "sync pass finished with {} failed of {} files",
            report.failures.len(),
            report.files_scanned
        )))
    }
}

fn print_sync_report(collection: &str, report: &SyncReport) {
    println!("\nSync pass complete for collection '{}'", collection);
    println!("  Files scanned: {}", report.files_scanned);
    println!("  Files skipped: {}", report.files_skipped);
    println!("  Files synced: {}", report.files_synced);
    println!("  Chunks upserted: {}", report.chunks_upserted);

    if !report.failures.is_empty() {
        println!("  Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("    {}: {}", failure.path, failure.error);
        }
    }
}
