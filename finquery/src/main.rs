use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finquery::config::Config;
use finquery::cost::CostLedger;
use finquery::embeddings::{EmbeddingApiClient, EmbeddingApiConfig, RerankerProvider};
use finquery::index::VectorIndexClient;
use finquery::llm::LlmApiClient;
use finquery::models::ResearchRequest;
use finquery::security::resolve_document_path;
use finquery::services::{AnswerGenerator, HybridRetriever, IngestionService, ResearchService};

#[derive(Parser)]
#[command(name = "finquery")]
#[command(about = "Research assistant over financial PDF filings")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF into the vector index
    Ingest {
        /// Path to a PDF, or a bare filename resolved in the documents directory
        path: String,
        /// Rebuild the index when its dimension no longer matches the model
        #[arg(long)]
        force_recreate: bool,
    },
    /// Ask a question against the ingested documents
    Query {
        query: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<i64>,
        /// Skip the keyword pass and search purely by similarity
        #[arg(long)]
        semantic_only: bool,
        /// Rerank retrieved chunks before answering
        #[arg(long)]
        rerank: bool,
    },
    /// List known documents
    Documents,
    /// Show index and spend statistics
    Stats,
    /// Delete every vector in the configured namespace
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finquery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());

    let embedder = Arc::new(EmbeddingApiClient::new(EmbeddingApiConfig::from_openai_config(
        &config.openai,
    ))?);
    let index = Arc::new(VectorIndexClient::new(config.index.clone())?);
    let ledger = Arc::new(CostLedger::new(config.cost.daily_limit_usd));

    match args.command {
        Command::Ingest {
            path,
            force_recreate,
        } => {
            let resolved = if path.contains(std::path::MAIN_SEPARATOR) {
                PathBuf::from(path)
            } else {
                resolve_document_path(&config.documents_dir, &path)?
            };
            let ingestion = IngestionService::new(
                embedder.clone(),
                index.clone(),
                ledger.clone(),
                config.clone(),
            );
            let report = ingestion.ingest_file(&resolved, force_recreate).await?;
            println!(
                "Ingested {} ({} pages, {} chunks, {} vectors, ${:.4})",
                report.filename,
                report.num_pages,
                report.chunks_created,
                report.vectors_upserted,
                report.cost_usd
            );
        }
        Command::Query {
            query,
            top_k,
            semantic_only,
            rerank,
        } => {
            let service = build_research_service(&config, embedder, index, ledger)?;
            let response = service
                .research(&ResearchRequest {
                    query,
                    top_k,
                    use_hybrid: !semantic_only,
                    use_reranking: rerank,
                    filter: None,
                })
                .await?;

            println!("{}\n", response.answer);
            for (i, source) in response.sources.iter().enumerate() {
                println!(
                    "[{}] {} p.{} (score {:.3}, {})",
                    i + 1,
                    source.document_name,
                    source.page_number,
                    source.score,
                    serde_json::to_string(&source.search_method)?.trim_matches('"'),
                );
            }
            println!("\nCost: ${:.4}", response.cost_usd);
        }
        Command::Documents => {
            let service = build_research_service(&config, embedder, index, ledger)?;
            for doc in service.list_documents().await? {
                match doc.file_size {
                    Some(size) => println!("{} ({}, {} bytes)", doc.name, doc.status, size),
                    None => println!("{} ({})", doc.name, doc.status),
                }
            }
        }
        Command::Stats => {
            let stats = index.stats().await?;
            println!(
                "Index: {} vectors, dimension {}",
                stats.total_vector_count, stats.dimension
            );
            for (namespace, count) in &stats.namespaces {
                let label = if namespace.is_empty() {
                    "(default)"
                } else {
                    namespace.as_str()
                };
                println!("  {label}: {count} vectors");
            }
            let summary = ledger.summary();
            println!(
                "Spend today ({}): ${:.2} of ${:.2}",
                summary.date, summary.daily_total, summary.daily_limit
            );
        }
        Command::Clear => {
            index.delete_all().await?;
            println!("Namespace cleared");
        }
    }

    Ok(())
}

fn build_research_service(
    config: &Arc<Config>,
    embedder: Arc<EmbeddingApiClient>,
    index: Arc<VectorIndexClient>,
    ledger: Arc<CostLedger>,
) -> anyhow::Result<ResearchService> {
    let reranker = Arc::new(RerankerProvider::new(config.reranker.as_ref())?);
    if !reranker.is_enabled() {
        tracing::debug!("Reranker disabled (no credential configured)");
    }
    let llm = Arc::new(LlmApiClient::new(&config.openai)?);

    let retriever = HybridRetriever::new(
        embedder.clone(),
        index.clone(),
        reranker,
        config.retrieval.clone(),
    );
    let answerer = AnswerGenerator::new(llm, config.cost.clone());

    Ok(ResearchService::new(
        retriever,
        answerer,
        embedder,
        index,
        ledger,
        config.clone(),
    ))
}
