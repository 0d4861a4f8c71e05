//! CLI entrypoint for the retrieval engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use embed::{DummyEmbedder, Embedder, LocalEmbedder};
use rag_core::{
    FormattedResult, IngestEvent, IngestOptions, Ingestor, MergeStrategy, PlainTextExtractor,
    QueryOptions, RagConfig, Retriever, ReturnShape, SearchOutput,
};
use store::{LanceStore, VectorStore};

#[derive(Parser)]
#[command(name = "rag")]
#[command(about = "Retrieval over document collections stored in LanceDB", long_about = None)]
struct Cli {
    /// Config file (default: search standard locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// LanceDB directory or URI, overrides [store].uri
    #[arg(long, global = true)]
    store: Option<String>,
    /// Embedding model, overrides [embedding].model ("dummy" for zero vectors)
    #[arg(long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the search commands. Unset values come from [search].
#[derive(Args)]
struct QueryArgs {
    /// Number of results (per collection when searching several)
    #[arg(short, long)]
    k: Option<usize>,
    /// Output shape: content, list or dict
    #[arg(long)]
    shape: Option<String>,
    /// Include distances in the output
    #[arg(long)]
    distance: bool,
    /// Drop results farther than this distance
    #[arg(long)]
    threshold: Option<f32>,
    /// Filter evaluated before ranking, e.g. "filename LIKE '%2022%'"
    #[arg(long)]
    filter: Option<String>,
    /// Per-collection timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections in the store
    Collections,
    /// Show document count for a collection
    Info {
        collection: String,
    },
    /// Search one collection
    Search {
        collection: String,
        query: String,
        #[command(flatten)]
        query_args: QueryArgs,
    },
    /// Search several collections and merge the results
    SearchMany {
        query: String,
        /// Collection to search (repeatable)
        #[arg(short, long = "collection", required = true)]
        collections: Vec<String>,
        /// Merge strategy: concatenate, interleave or best
        #[arg(long)]
        merge: Option<String>,
        /// Cap on merged results
        #[arg(long)]
        total_k: Option<usize>,
        #[command(flatten)]
        query_args: QueryArgs,
    },
    /// Semantic search reranked by keyword matches
    Hybrid {
        query: String,
        /// Collection to search (repeatable)
        #[arg(short, long = "collection", required = true)]
        collections: Vec<String>,
        /// Boost term (repeatable); extracted from the query when omitted
        #[arg(short, long = "boost")]
        boost: Vec<String>,
        /// Weight of semantic distance, in [0, 1]
        #[arg(long)]
        semantic_weight: Option<f32>,
        #[command(flatten)]
        query_args: QueryArgs,
    },
    /// Route a question to collections and print the retrieved context
    Ask {
        question: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// List documents whose filename matches a LIKE pattern
    Files {
        collection: String,
        /// Pattern such as "%2022%"
        pattern: String,
        #[arg(long)]
        shape: Option<String>,
    },
    /// Load dataset directories into collections
    Ingest {
        /// Collections to ingest (default: [ingest].collections)
        collections: Vec<String>,
        /// Dataset root holding one directory per collection
        #[arg(long)]
        dataset: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a commented default config file
    Init {
        /// Target path (default: the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RagConfig::load_from(path)?,
        None => RagConfig::load()?,
    };
    if let Some(uri) = &cli.store {
        config.store.uri = Some(uri.clone());
    }
    if let Some(model) = &cli.model {
        config.embedding.model = model.clone();
    }

    match cli.command {
        Commands::Config { command } => run_config(command, &config)?,
        Commands::Collections => {
            let store = open_store(&config).await?;
            for name in store.collection_names().await? {
                println!("{}", name);
            }
        }
        Commands::Info { collection } => {
            // counting rows never embeds, so skip loading a model
            let retriever = Retriever::from_config(open_store(&config).await?, Arc::new(DummyEmbedder), &config);
            let info = retriever.collection_info(&collection).await?;
            println!("{}: {} documents", info.name, info.row_count);
        }
        Commands::Search { collection, query, query_args } => {
            let options = query_options(&config, &query_args)?;
            let retriever = retriever(&config).await?;
            let result = retriever.search(&collection, &query, &options).await?;
            print_result(&result)?;
        }
        Commands::SearchMany { query, collections, merge, total_k, query_args } => {
            let mut options = query_options(&config, &query_args)?;
            if let Some(merge) = merge {
                options.merge_strategy = merge.parse::<MergeStrategy>()?;
            }
            if total_k.is_some() {
                options.total_k = total_k;
            }
            let retriever = retriever(&config).await?;
            let output = retriever.search_many(&collections, &query, &options).await?;
            print_output(&output)?;
        }
        Commands::Hybrid { query, collections, boost, semantic_weight, query_args } => {
            let mut options = query_options(&config, &query_args)?;
            if let Some(weight) = semantic_weight {
                options.semantic_weight = weight;
            }
            let boost = if boost.is_empty() { rag_core::extract_boost_terms(&query) } else { boost };
            info!("boost terms: {:?}", boost);
            let retriever = retriever(&config).await?;
            let output = retriever.hybrid_search(&collections, &query, &boost, &options).await?;
            print_output(&output)?;
        }
        Commands::Ask { question, k } => {
            let retriever = retriever(&config).await?;
            let output = retriever.retrieve_context(&question, k.unwrap_or(config.search.k)).await?;
            print_output(&output)?;
        }
        Commands::Files { collection, pattern, shape } => {
            let shape = match shape {
                Some(s) => s.parse::<ReturnShape>()?,
                None => config.search.shape,
            };
            let retriever = retriever(&config).await?;
            let result = retriever.documents_by_filename(&collection, &pattern, shape).await?;
            print_result(&result)?;
        }
        Commands::Ingest { collections, dataset, batch_size, max_files } => {
            run_ingest(&config, collections, dataset, batch_size, max_files).await?;
        }
    }
    Ok(())
}

fn run_config(command: ConfigCommand, config: &RagConfig) -> Result<()> {
    match command {
        ConfigCommand::Init { path, force } => {
            let path = match path.or_else(RagConfig::default_config_path) {
                Some(p) => p,
                None => bail!("no config directory on this platform, pass --path"),
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, RagConfig::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

async fn run_ingest(
    config: &RagConfig,
    collections: Vec<String>,
    dataset: Option<String>,
    batch_size: Option<usize>,
    max_files: Option<usize>,
) -> Result<()> {
    let mut options = IngestOptions::from(&config.ingest);
    if let Some(dataset) = dataset {
        options.dataset_path = PathBuf::from(shellexpand::tilde(&dataset).into_owned());
    }
    if let Some(size) = batch_size {
        options.batch_size = size;
    }
    if max_files.is_some() {
        options.max_files = max_files;
    }
    let collections = if collections.is_empty() { config.ingest.collections.clone() } else { collections };

    let ingestor = Ingestor::new(options, PlainTextExtractor, load_embedder(config)?, open_store(config).await?);
    let reports = ingestor
        .ingest_all(&collections, |event| match event {
            IngestEvent::CollectionStarted(name, n) => eprintln!("  {}: {} files", name, n),
            IngestEvent::FileFailed(path, reason) => eprintln!("  failed: {} ({})", path.display(), reason),
            IngestEvent::CollectionWritten(name, n) => eprintln!("  done: {} ({} documents)", name, n),
            _ => {}
        })
        .await;

    let mut errors = 0;
    for report in &reports {
        match &report.error {
            Some(error) if report.succeeded.is_empty() => {
                errors += 1;
                println!("{}: error: {}", report.collection, error);
            }
            _ => println!(
                "{}: {} ingested, {} failed",
                report.collection,
                report.succeeded.len(),
                report.failed.len()
            ),
        }
    }
    if errors == reports.len() && !reports.is_empty() {
        bail!("no collection could be ingested");
    }
    Ok(())
}

fn query_options(config: &RagConfig, args: &QueryArgs) -> Result<QueryOptions> {
    let mut options = QueryOptions::from(&config.search);
    if let Some(k) = args.k {
        options.k = k;
    }
    if let Some(shape) = &args.shape {
        options.shape = shape.parse::<ReturnShape>()?;
    }
    if args.distance {
        options.include_distance = true;
    }
    if args.threshold.is_some() {
        options.distance_threshold = args.threshold;
    }
    if let Some(secs) = args.timeout_secs {
        options.timeout = Some(Duration::from_secs(secs));
    }
    options.prefilter = args.filter.clone();
    Ok(options)
}

async fn open_store(config: &RagConfig) -> Result<Arc<dyn VectorStore>> {
    let uri = shellexpand::tilde(&config.store_uri()).into_owned();
    info!("opening store at {}", uri);
    Ok(Arc::new(LanceStore::connect(&uri).await?))
}

fn load_embedder(config: &RagConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding.model.as_str() {
        "dummy" => Ok(Arc::new(DummyEmbedder)),
        name => Ok(Arc::new(LocalEmbedder::from_name(name)?)),
    }
}

async fn retriever(config: &RagConfig) -> Result<Retriever> {
    Ok(Retriever::from_config(open_store(config).await?, load_embedder(config)?, config))
}

fn print_result(result: &FormattedResult) -> Result<()> {
    match result {
        FormattedResult::Content(text) if text.is_empty() => eprintln!("No results."),
        FormattedResult::Content(text) => println!("{}", text),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

fn print_output(output: &SearchOutput) -> Result<()> {
    if let Some(partial) = &output.partial_failure {
        eprintln!("warning: {}", partial);
    }
    print_result(&output.result)
}
