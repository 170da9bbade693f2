mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use canlex_core::RetrievalConfig;
use canlex_core::types::Language;
use canlex_ai::{CrossEncoderClient, EMBEDDING_DIM, EmbedderClient};
use canlex_ingest::Indexer;
use canlex_search::{Reranker, RetrievalFacade, SearchEngine, SearchOptions};
use canlex_store::{EmbeddingStore, MetadataField, MetadataQuery, ResourceStore};

#[derive(Parser)]
#[command(
    name = "canlex",
    version,
    about = "Bilingual retrieval over Canadian federal legislation"
)]
struct Cli {
    /// Directory holding the resource and embedding databases
    #[arg(long, default_value = "./data", global = true, env = "CANLEX_DATA_DIR")]
    data_dir: PathBuf,

    /// Base URL of the embedding provider
    #[arg(
        long,
        default_value = "http://localhost:8801",
        global = true,
        env = "CANLEX_EMBEDDER_URL"
    )]
    embedder_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        default_value = "multilingual-e5-large",
        global = true,
        env = "CANLEX_EMBEDDING_MODEL"
    )]
    embedding_model: String,

    /// Base URL of the cross-encoder reranking provider
    #[arg(
        long,
        default_value = "http://localhost:8802",
        global = true,
        env = "CANLEX_RERANKER_URL"
    )]
    reranker_url: String,

    /// Skip cache reads and writes
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and index a directory of LIMS XML files
    Ingest {
        /// Directory containing .xml documents (searched recursively)
        xml_dir: PathBuf,
    },

    /// Hybrid search over the index
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Restrict to one language (en or fr)
        #[arg(long)]
        language: Option<String>,

        /// Restrict to one source type (e.g. act_section, defined_term)
        #[arg(long)]
        source_type: Option<String>,

        /// Restrict to one act
        #[arg(long)]
        act: Option<String>,

        /// Restrict to one regulation
        #[arg(long)]
        regulation: Option<String>,

        /// Boost and include defined terms
        #[arg(long)]
        with_definitions: bool,

        /// Attach opposite-language counterparts
        #[arg(long)]
        bilingual: bool,
    },

    /// Build the full cited context for a query (search + rerank +
    /// assemble + hydrate)
    Context {
        query: String,

        #[arg(long, default_value_t = 8)]
        limit: usize,
    },

    /// Hydrate one act or regulation to markdown
    Hydrate {
        /// Document id, e.g. C-46 or SOR-86-304
        doc_id: String,

        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Show index summary statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = RetrievalConfig::default();
    config.cache_bypass = cli.no_cache;

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("cannot create data dir {}", cli.data_dir.display()))?;
    let resources = Arc::new(ResourceStore::open_persistent(
        &cli.data_dir.join("resources.duckdb"),
    )?);
    let embeddings = Arc::new(
        EmbeddingStore::open(&cli.data_dir.join("embeddings.lance"), EMBEDDING_DIM).await?,
    );
    let embedder = Arc::new(EmbedderClient::new(
        cli.embedder_url.clone(),
        cli.embedding_model.clone(),
        config.embedding_cache_ttl,
    ));
    let reranker_url = cli.reranker_url.clone();

    match cli.command {
        Command::Ingest { xml_dir } => {
            let indexer = Indexer::new(resources, embeddings, embedder, &config)?;
            let report = indexer.ingest_directory(&xml_dir).await?;
            display::print_ingest_report(&report);
            Ok(())
        }
        Command::Search {
            query,
            limit,
            language,
            source_type,
            act,
            regulation,
            with_definitions,
            bilingual,
        } => {
            let engine = SearchEngine::new(resources, embeddings, embedder, config);
            let options = SearchOptions {
                limit: Some(limit),
                language: language.as_deref().and_then(Language::parse),
                source_type: source_type
                    .as_deref()
                    .and_then(canlex_core::types::SourceType::parse),
                act_id: act,
                regulation_id: regulation,
                include_paired_language: bilingual,
                ..Default::default()
            };
            let results = if with_definitions {
                engine.search_with_definitions(&query, &options).await?
            } else if bilingual {
                engine.search_bilingual(&query, &options).await?
            } else {
                engine.search(&query, &options).await?
            };
            display::print_results(&results);
            Ok(())
        }
        Command::Context { query, limit } => {
            let facade = build_facade(resources, embeddings, embedder, &reranker_url, config);
            let context = facade.get_context(&query, limit).await?;
            display::print_context(&context);
            Ok(())
        }
        Command::Hydrate { doc_id, language } => {
            let language = Language::parse(&language)
                .with_context(|| format!("unknown language '{language}'"))?;
            let facade = build_facade(resources, embeddings, embedder, &reranker_url, config);
            match facade.get_hydrated_act_markdown(&doc_id, language)? {
                Some(hydrated) => {
                    if let Some(note) = &hydrated.note {
                        println!("> {note}\n");
                    }
                    println!("{}", hydrated.markdown);
                }
                None => println!("Document '{doc_id}' not found."),
            }
            Ok(())
        }
        Command::Stats => {
            let count = resources.count_all()?;
            println!("=== Index Summary ===\n");
            println!("  Resources: {count:>8} rows");
            let embedded = embeddings.count().await.unwrap_or(0);
            println!("  Embeddings: {embedded:>7} rows\n");

            for (title, field) in [
                ("Source Types", MetadataField::SourceType),
                ("Languages", MetadataField::Language),
                ("Statuses", MetadataField::Status),
            ] {
                println!("--- {title} ---");
                for (value, n) in resources.counts_grouped(field)? {
                    println!("  {value:<24} {n:>8}");
                }
                println!();
            }

            let acts = resources.list_distinct_values(MetadataField::ActId, &MetadataQuery::default())?;
            let regs = resources
                .list_distinct_values(MetadataField::RegulationId, &MetadataQuery::default())?;
            println!("  Acts indexed:        {:>8}", acts.len());
            println!("  Regulations indexed: {:>8}", regs.len());
            Ok(())
        }
    }
}

fn build_facade(
    resources: Arc<ResourceStore>,
    embeddings: Arc<EmbeddingStore>,
    embedder: Arc<EmbedderClient>,
    reranker_url: &str,
    config: RetrievalConfig,
) -> RetrievalFacade {
    let engine = Arc::new(SearchEngine::new(
        resources,
        embeddings,
        embedder,
        config.clone(),
    ));
    let cross_encoder = Arc::new(CrossEncoderClient::new(
        reranker_url.to_string(),
        "bge-reranker-v2-m3".into(),
        "bge-reranker-v2-m3".into(),
    ));
    let reranker = Reranker::new(cross_encoder, config.clone());
    RetrievalFacade::new(engine, reranker, config)
}
