use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use extract::{LlmExtractor, OllamaClient};
use index::{GraphIngestor, GraphStore, MemoryGraphStore, Neo4jStore};
use ingest::JsonlReader;
use pipeline::{
    ArticleProcessor, JsonlSink, Metrics, PipelineConfig, PipelineRunner, RecordLoader,
    RetryPolicy,
};

#[derive(Parser)]
#[command(name = "graph-pipeline", about = "Extract entities from news articles into a Neo4j graph")]
struct Cli {
    /// JSON config file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract entities and relationships from a corpus into article records
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Load article records into the graph
    Load {
        #[arg(long)]
        input: PathBuf,
        /// Use an in-memory graph and print its counts instead of writing to Neo4j
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract, then load the records that were written
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create the graph uniqueness constraints
    InitSchema,
}

/// The graph store for this run, closed explicitly on the way out.
enum GraphHandle {
    Neo4j(Arc<Neo4jStore>),
    Memory(Arc<MemoryGraphStore>),
}

impl GraphHandle {
    async fn open(config: &PipelineConfig, dry_run: bool) -> Result<Self> {
        if dry_run {
            info!("Dry run: using in-memory graph");
            return Ok(GraphHandle::Memory(Arc::new(MemoryGraphStore::new())));
        }
        let (uri, user, password) = config.graph_credentials()?;
        let store = Neo4jStore::connect(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;
        // Entity MERGEs from concurrent articles rely on the uniqueness constraints
        store
            .init_schema()
            .await
            .context("Failed to ensure Neo4j constraints")?;
        Ok(GraphHandle::Neo4j(Arc::new(store)))
    }

    fn store(&self) -> Arc<dyn GraphStore> {
        match self {
            GraphHandle::Neo4j(store) => store.clone(),
            GraphHandle::Memory(store) => store.clone(),
        }
    }

    fn close(self) {
        match self {
            GraphHandle::Neo4j(store) => match Arc::try_unwrap(store) {
                Ok(store) => store.close(),
                Err(_) => warn!("Neo4j store still referenced at shutdown"),
            },
            GraphHandle::Memory(_) => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight articles");
                cancel.cancel();
            }
        });
    }

    let metrics = Metrics::new();

    match cli.command {
        Command::Extract { input, output } => {
            extract(&config, &input, &output, &metrics, &cancel).await?;
        }
        Command::Load { input, dry_run } => {
            let graph = GraphHandle::open(&config, dry_run).await?;
            let result = load(&config, &input, &graph, &metrics, &cancel).await;
            graph.close();
            result?;
        }
        Command::Run {
            input,
            output,
            dry_run,
        } => {
            // Open the graph first so missing credentials fail before any extraction
            let graph = GraphHandle::open(&config, dry_run).await?;
            let result = async {
                extract(&config, &input, &output, &metrics, &cancel).await?;
                if cancel.is_cancelled() {
                    return Ok::<_, anyhow::Error>(());
                }
                load(&config, &output, &graph, &metrics, &cancel).await
            }
            .await;
            graph.close();
            result?;
        }
        Command::InitSchema => {
            let (uri, user, password) = config.graph_credentials()?;
            let store = Neo4jStore::connect(uri, user, password).await?;
            store.init_schema().await?;
            store.close();
        }
    }

    let snapshot = metrics.snapshot();
    info!(metrics = %serde_json::to_string(&snapshot)?, "Run summary");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn extract(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
    metrics: &Arc<Metrics>,
    cancel: &CancellationToken,
) -> Result<()> {
    info!(input = ?input, output = ?output, "Extracting entities and relationships");

    let client = OllamaClient::new(
        config.extraction.base_url.clone(),
        config.extraction.model.clone(),
        config.request_timeout(),
    )?;
    let backend = Arc::new(LlmExtractor::new(client, config.allow_list()));

    let processor = ArticleProcessor::new(
        backend,
        config.splitter()?,
        RetryPolicy::from(&config.retry),
        metrics.clone(),
    )
    .with_chunk_fanout(config.extraction.chunk_fanout)
    .with_max_concurrent_calls(config.concurrency.max_concurrent_llm_calls);

    let runner = PipelineRunner::new(processor, metrics.clone())
        .with_workers(config.concurrency.workers)
        .with_cancellation(cancel.clone());

    let mut reader = JsonlReader::open(input)
        .await
        .context(format!("Failed to open corpus: {:?}", input))?;
    let mut sink = JsonlSink::create(output).await?;

    runner.run(&mut reader, &mut sink).await?;
    info!(output = ?output, "Article records saved");
    Ok(())
}

async fn load(
    config: &PipelineConfig,
    input: &Path,
    graph: &GraphHandle,
    metrics: &Arc<Metrics>,
    cancel: &CancellationToken,
) -> Result<()> {
    info!(input = ?input, "Loading article records into graph");

    let ingestor = GraphIngestor::new(graph.store(), config.ingest_options());
    let loader = RecordLoader::new(ingestor, RetryPolicy::from(&config.ingest_retry), metrics.clone())
        .with_workers(config.concurrency.ingest_workers)
        .with_cancellation(cancel.clone());

    let mut reader = JsonlReader::open(input)
        .await
        .context(format!("Failed to open records: {:?}", input))?;
    loader.run(&mut reader).await?;

    let stats = graph.store().stats().await?;
    info!(
        articles = stats.articles,
        entities = stats.entities,
        co_occurrence_edges = stats.co_occurrence_edges,
        relation_edges = stats.relation_edges,
        "Graph loaded"
    );
    Ok(())
}
