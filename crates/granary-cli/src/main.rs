//! Granary CLI - Command-line interface
//!
//! Usage:
//!   granary ingest --dir ./docs --url https://example.com/doc1
//!   granary create-collection --name my_collection --dimension 100
//!   granary insert-random --count 100
//!   granary search --k 5 --filter-field rand_number --filter-lt 3
//!   granary demo
//!
//! Each source adapter and vector operation is enabled explicitly by a
//! flag or subcommand; configuration comes from a TOML file and
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::{error, info, warn};

use granary_core::{AppConfig, CollectionSpec, Distance, PayloadFilter, VectorPoint};
use granary_ingest::{
    Collector, DatabaseSource, DropboxSource, GoogleDriveSource, LocalDirSource, OneDriveSource,
    SourceAdapter, WebSource,
};
use granary_vector::{ChromaStore, DocumentStore, QdrantStore, VectorStore};

#[derive(Parser)]
#[command(name = "granary")]
#[command(about = "Document ingestion into vector stores")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file; environment variables otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather documents from enabled sources and upsert them into Chroma
    Ingest {
        /// Local directory to scan
        #[arg(long)]
        dir: Option<PathBuf>,

        /// File extensions kept by the directory scan
        #[arg(long, default_value = "txt")]
        ext: Vec<String>,

        /// Web URL to fetch (repeatable)
        #[arg(long)]
        url: Vec<String>,

        /// Enable the Dropbox adapter (needs DROPBOX_ACCESS_TOKEN)
        #[arg(long)]
        dropbox: bool,

        /// Enable the OneDrive adapter (needs ONEDRIVE_ACCESS_TOKEN)
        #[arg(long)]
        onedrive: bool,

        /// Enable the Google Drive adapter (needs GDRIVE_ACCESS_TOKEN)
        #[arg(long)]
        gdrive: bool,

        /// Enable the database adapter (needs DATABASE_URL)
        #[arg(long)]
        database: bool,

        /// Target collection (defaults to the configured one)
        #[arg(long)]
        collection: Option<String>,

        /// Run one similarity query after ingesting
        #[arg(long)]
        query: Option<String>,
    },

    /// Create a Qdrant collection (or open the existing one)
    CreateCollection {
        /// Collection name (defaults to the configured one)
        #[arg(long)]
        name: Option<String>,

        /// Vector dimensionality
        #[arg(long)]
        dimension: Option<usize>,

        /// Distance metric: cosine, dot, or euclid
        #[arg(long)]
        distance: Option<Distance>,
    },

    /// Bulk-insert random vectors into the Qdrant collection
    InsertRandom {
        /// Target collection (defaults to the configured one)
        #[arg(long)]
        collection: Option<String>,

        /// Number of points to insert
        #[arg(long, default_value_t = 100)]
        count: usize,
    },

    /// Nearest-neighbor search with a random query vector
    Search {
        /// Target collection (defaults to the configured one)
        #[arg(long)]
        collection: Option<String>,

        /// Number of nearest points to return
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Payload field to filter on
        #[arg(long)]
        filter_field: Option<String>,

        /// Keep only points where the field is < this bound (exclusive)
        #[arg(long)]
        filter_lt: Option<f64>,

        /// Keep only points where the field is > this bound (exclusive)
        #[arg(long)]
        filter_gt: Option<f64>,

        /// Keep only points where the field is >= this bound
        #[arg(long)]
        filter_gte: Option<f64>,

        /// Keep only points where the field is <= this bound
        #[arg(long)]
        filter_lte: Option<f64>,
    },

    /// Example flow: create, insert, search, filtered search
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.command {
        Commands::Ingest {
            dir,
            ext,
            url,
            dropbox,
            onedrive,
            gdrive,
            database,
            collection,
            query,
        } => {
            let adapters = build_adapters(
                &config, dir, ext, url, dropbox, onedrive, gdrive, database,
            )
            .await;
            let name = collection.unwrap_or_else(|| config.chroma.collection.clone());
            run_ingest(&config, adapters, &name, query.as_deref()).await?;
        }
        Commands::CreateCollection {
            name,
            dimension,
            distance,
        } => {
            let spec = CollectionSpec::new(
                name.unwrap_or_else(|| config.qdrant.collection.clone()),
                dimension.unwrap_or(config.qdrant.dimension),
                distance.unwrap_or(config.qdrant.distance),
            );
            let store = QdrantStore::new(&config.qdrant)?;
            store.ensure_collection(&spec).await?;
            println!("collection '{}' ready", spec.name);
        }
        Commands::InsertRandom { collection, count } => {
            let name = collection.unwrap_or_else(|| config.qdrant.collection.clone());
            let store = QdrantStore::new(&config.qdrant)?;
            insert_random(&store, &name, config.qdrant.dimension, count).await?;
            println!("inserted {count} random points into '{name}'");
        }
        Commands::Search {
            collection,
            k,
            filter_field,
            filter_lt,
            filter_gt,
            filter_gte,
            filter_lte,
        } => {
            let name = collection.unwrap_or_else(|| config.qdrant.collection.clone());
            let filter = build_filter(filter_field, filter_lt, filter_gt, filter_gte, filter_lte);
            let store = QdrantStore::new(&config.qdrant)?;
            let query = random_vector(config.qdrant.dimension);

            let hits = store.search(&name, &query, k, filter.as_ref()).await?;
            for hit in &hits {
                println!("{}\tscore {:.4}\t{:?}", hit.id, hit.score, hit.payload);
            }
            println!("{} hits", hits.len());
        }
        Commands::Demo => {
            run_demo(&config).await?;
        }
    }

    Ok(())
}

/// Build the enabled adapters. A missing credential fails only that
/// adapter: it is logged and the rest still run.
#[allow(clippy::too_many_arguments)]
async fn build_adapters(
    config: &AppConfig,
    dir: Option<PathBuf>,
    ext: Vec<String>,
    urls: Vec<String>,
    dropbox: bool,
    onedrive: bool,
    gdrive: bool,
    database: bool,
) -> Vec<Box<dyn SourceAdapter>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
    let timeout = Duration::from_secs(config.sources.fetch_timeout_secs);

    if let Some(dir) = dir {
        adapters.push(Box::new(LocalDirSource::new(dir, ext)));
    }
    if !urls.is_empty() {
        adapters.push(Box::new(WebSource::with_timeout(urls, timeout)));
    }
    if dropbox {
        match &config.sources.dropbox_token {
            Some(token) => adapters.push(Box::new(DropboxSource::new(token.clone()))),
            None => error!("dropbox adapter enabled but DROPBOX_ACCESS_TOKEN is not set"),
        }
    }
    if onedrive {
        match &config.sources.onedrive_token {
            Some(token) => adapters.push(Box::new(OneDriveSource::new(token.clone()))),
            None => error!("onedrive adapter enabled but ONEDRIVE_ACCESS_TOKEN is not set"),
        }
    }
    if gdrive {
        match &config.sources.gdrive_token {
            Some(token) => adapters.push(Box::new(GoogleDriveSource::new(token.clone()))),
            None => error!("gdrive adapter enabled but GDRIVE_ACCESS_TOKEN is not set"),
        }
    }
    if database {
        match &config.sources.database_url {
            Some(url) => {
                match DatabaseSource::connect(url, config.sources.database_table.clone()).await {
                    Ok(source) => adapters.push(Box::new(source)),
                    Err(e) => error!(error = %e, "database adapter unavailable"),
                }
            }
            None => error!("database adapter enabled but DATABASE_URL is not set"),
        }
    }

    adapters
}

async fn run_ingest(
    config: &AppConfig,
    adapters: Vec<Box<dyn SourceAdapter>>,
    collection: &str,
    query: Option<&str>,
) -> anyhow::Result<()> {
    let collector =
        Collector::new().with_timeout(Duration::from_secs(config.sources.fetch_timeout_secs));
    let report = collector.collect(adapters).await;

    for failure in &report.failures {
        warn!(adapter = %failure.adapter, message = %failure.message, "source failed");
    }

    if report.documents.is_empty() {
        info!("no documents gathered; nothing to ingest");
        return Ok(());
    }

    let store = ChromaStore::new(config.chroma.url.clone());
    let handle = store.ensure_collection(collection).await?;

    store.add_documents(&handle, &report.documents).await?;
    println!(
        "ingested {} documents into '{}' ({} source failures)",
        report.documents.len(),
        collection,
        report.failures.len()
    );

    if let Some(text) = query {
        match store.query(&handle, text, 2, None).await {
            Ok(hits) => {
                for hit in &hits {
                    println!(
                        "{}\tdistance {:?}\t{}",
                        hit.id,
                        hit.distance,
                        hit.document.as_deref().unwrap_or("")
                    );
                }
            }
            Err(e) => error!(error = %e, "test query failed"),
        }
    }

    Ok(())
}

async fn insert_random(
    store: &QdrantStore,
    collection: &str,
    dimension: usize,
    count: usize,
) -> anyhow::Result<()> {
    let points: Vec<VectorPoint> = (0..count)
        .map(|idx| {
            VectorPoint::new(idx as u64, random_vector(dimension))
                .with_payload("color", "red")
                .with_payload("rand_number", (idx % 10) as u64)
        })
        .collect();

    store.upsert(collection, points).await?;
    Ok(())
}

/// The example flow from the vector-search template: create a collection,
/// insert random vectors, search, then search again with a payload
/// filter. Each step is logged and a failing step does not stop the next.
async fn run_demo(config: &AppConfig) -> anyhow::Result<()> {
    let store = QdrantStore::new(&config.qdrant)?;
    let spec = CollectionSpec::new(
        config.qdrant.collection.clone(),
        config.qdrant.dimension,
        config.qdrant.distance,
    );

    if let Err(e) = store.ensure_collection(&spec).await {
        error!(error = %e, "create collection failed");
    }

    if let Err(e) = insert_random(&store, &spec.name, spec.dimension, 100).await {
        error!(error = %e, "insert failed");
    }

    let query = random_vector(spec.dimension);
    match store.search(&spec.name, &query, 5, None).await {
        Ok(hits) => {
            println!("search results:");
            for hit in &hits {
                println!("  {}\tscore {:.4}", hit.id, hit.score);
            }
        }
        Err(e) => error!(error = %e, "search failed"),
    }

    // Keep only points whose rand_number payload is strictly below 3.
    let filter = PayloadFilter::new().lt("rand_number", 3.0);
    match store.search(&spec.name, &query, 5, Some(&filter)).await {
        Ok(hits) => {
            println!("filtered search results (rand_number < 3):");
            for hit in &hits {
                println!(
                    "  {}\tscore {:.4}\trand_number {:?}",
                    hit.id,
                    hit.score,
                    hit.payload.get("rand_number")
                );
            }
        }
        Err(e) => error!(error = %e, "filtered search failed"),
    }

    Ok(())
}

fn random_vector(dimension: usize) -> Vec<f32> {
    let mut rng = rand::rng();
    (0..dimension).map(|_| rng.random::<f32>()).collect()
}

fn build_filter(
    field: Option<String>,
    lt: Option<f64>,
    gt: Option<f64>,
    gte: Option<f64>,
    lte: Option<f64>,
) -> Option<PayloadFilter> {
    let field = field?;
    let mut filter = PayloadFilter::new();

    if let Some(b) = lt {
        filter = filter.lt(field.clone(), b);
    }
    if let Some(b) = gt {
        filter = filter.gt(field.clone(), b);
    }
    if let Some(b) = gte {
        filter = filter.gte(field.clone(), b);
    }
    if let Some(b) = lte {
        filter = filter.lte(field.clone(), b);
    }

    if filter.is_empty() {
        None
    } else {
        Some(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_vector_length() {
        assert_eq!(random_vector(100).len(), 100);
    }

    #[test]
    fn test_build_filter_needs_field_and_bound() {
        assert!(build_filter(None, Some(3.0), None, None, None).is_none());
        assert!(build_filter(Some("x".to_string()), None, None, None, None).is_none());

        let filter = build_filter(Some("rand_number".to_string()), Some(3.0), None, None, None)
            .unwrap();
        assert_eq!(filter.must.len(), 1);
    }
}
