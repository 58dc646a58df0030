use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub index: IndexConfig,
    pub reranker: Option<RerankerConfig>,
    pub processing: ProcessingConfig,
    pub retrieval: RetrievalConfig,
    pub cost: CostConfig,
    pub documents_dir: PathBuf,
}

/// OpenAI access for both the chat model and the embedding model.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub embedding_model: String,
    /// Override for tests and OpenAI-compatible gateways.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts per network call, including the first.
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub api_key: Option<String>,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    pub namespace: String,
    /// Control-plane URL (index listing/creation). Overridable for tests.
    pub control_url: String,
    /// Data-plane host. When set, control-plane resolution is skipped.
    pub host: Option<String>,
    pub timeout_secs: u64,
    pub upsert_batch_size: usize,
}

/// Present only when a reranking credential is configured.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankerConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Flat cost charged per rerank call when accounting spend.
    pub cost_per_call_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Sources below this semantic score are dropped from responses.
    pub relevance_threshold: f32,
    pub keyword_boost: f32,
    /// Stored chunk text is truncated to this many characters in the index.
    pub metadata_text_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CostConfig {
    pub daily_limit_usd: f64,
    pub embedding_per_1k_tokens: f64,
    pub llm_input_per_1k_tokens: f64,
    pub llm_output_per_1k_tokens: f64,
    pub index_per_result: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: env::var("OPENAI_API_KEY").ok(),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4-turbo-preview".to_string()),
                embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-large".to_string()),
                base_url: env::var("OPENAI_BASE_URL").ok(),
                timeout_secs: parse_env_or("OPENAI_TIMEOUT", 60),
                max_attempts: parse_env_or("OPENAI_MAX_ATTEMPTS", 3),
            },
            index: IndexConfig {
                api_key: env::var("PINECONE_API_KEY").ok(),
                index_name: env::var("PINECONE_INDEX_NAME")
                    .unwrap_or_else(|_| "investment-research".to_string()),
                cloud: env::var("PINECONE_CLOUD").unwrap_or_else(|_| "aws".to_string()),
                region: env::var("PINECONE_ENVIRONMENT").unwrap_or_else(|_| "us-east-1".to_string()),
                namespace: env::var("PINECONE_NAMESPACE").unwrap_or_default(),
                control_url: env::var("PINECONE_CONTROL_URL")
                    .unwrap_or_else(|_| "https://api.pinecone.io".to_string()),
                host: env::var("PINECONE_INDEX_HOST").ok(),
                timeout_secs: parse_env_or("PINECONE_TIMEOUT", 30),
                upsert_batch_size: parse_env_or("PINECONE_UPSERT_BATCH_SIZE", 100),
            },
            reranker: env::var("COHERE_API_KEY").ok().filter(|k| !k.is_empty()).map(|api_key| {
                RerankerConfig {
                    api_key,
                    model: env::var("COHERE_RERANK_MODEL")
                        .unwrap_or_else(|_| "rerank-english-v3.0".to_string()),
                    base_url: env::var("COHERE_BASE_URL")
                        .unwrap_or_else(|_| "https://api.cohere.com".to_string()),
                    timeout_secs: parse_env_or("COHERE_TIMEOUT", 30),
                    cost_per_call_usd: parse_env_or("COHERE_RERANK_COST_USD", 0.002),
                }
            }),
            processing: ProcessingConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 1000),
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200),
                embed_batch_size: parse_env_or("EMBED_BATCH_SIZE", 100),
            },
            retrieval: RetrievalConfig {
                default_top_k: parse_env_or("TOP_K_RESULTS", 5),
                max_top_k: parse_env_or("MAX_TOP_K", 20),
                relevance_threshold: parse_env_or("RELEVANCE_THRESHOLD", 0.30),
                keyword_boost: parse_env_or("KEYWORD_BOOST", 0.1),
                metadata_text_limit: parse_env_or("METADATA_TEXT_LIMIT", 1000),
            },
            cost: CostConfig {
                daily_limit_usd: parse_env_or("MAX_DAILY_COST_USD", 20.0),
                embedding_per_1k_tokens: parse_env_or("EMBEDDING_COST_PER_1K", 0.00013),
                llm_input_per_1k_tokens: parse_env_or("LLM_INPUT_COST_PER_1K", 0.01),
                llm_output_per_1k_tokens: parse_env_or("LLM_OUTPUT_COST_PER_1K", 0.03),
                index_per_result: parse_env_or("INDEX_COST_PER_RESULT", 0.0001),
            },
            documents_dir: env::var("DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("demo_data/documents")),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Embedding dimension for each supported OpenAI embedding model.
pub fn embedding_dimension(model: &str) -> crate::error::Result<usize> {
    match model {
        "text-embedding-3-large" => Ok(3072),
        "text-embedding-3-small" => Ok(1536),
        "text-embedding-ada-002" => Ok(1536),
        other => Err(crate::error::FinqueryError::Config(format!(
            "Unknown embedding model: {other}. Supported models: text-embedding-3-large, text-embedding-3-small, text-embedding-ada-002"
        ))),
    }
}
