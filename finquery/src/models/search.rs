use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::RecordMetadata;

/// How a result entered the merged candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Semantic,
    Keyword,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
    pub search_method: SearchMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub keyword_matches: u32,
    /// Pre-rerank similarity, preserved because the relevance-threshold
    /// filter at the boundary operates on this, never the rerank score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_relevance: Option<f32>,
}

impl SearchResult {
    pub fn new(id: String, score: f32, metadata: RecordMetadata, method: SearchMethod) -> Self {
        Self {
            id,
            score,
            metadata,
            search_method: method,
            matched_keywords: Vec::new(),
            keyword_matches: 0,
            semantic_score: None,
            rerank_score: None,
            rerank_relevance: None,
        }
    }

    /// Score used for relevance filtering: always the similarity score,
    /// falling back through `semantic_score` when reranking reordered us.
    pub fn relevance_score(&self) -> f32 {
        self.semantic_score.unwrap_or(self.score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    /// Blend a keyword pass into the semantic search. On by default;
    /// turning it off saves the second embedding call.
    #[serde(default = "default_use_hybrid")]
    pub use_hybrid: bool,
    #[serde(default)]
    pub use_reranking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

fn default_use_hybrid() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCitation {
    pub document_name: String,
    pub page_number: u32,
    pub text: String,
    pub score: f32,
    pub search_method: SearchMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub query: String,
    pub cost_usd: f64,
}

/// Result of query validation. Produced fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryValidationResult {
    pub is_valid: bool,
    pub sanitized_query: String,
    pub warnings: Vec<String>,
    /// 0.0 to 1.0, higher = more suspicious.
    pub threat_score: f32,
}

/// Advisory multi-part analysis; informs prompt construction, never blocks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryComplexity {
    pub is_multi_part: bool,
    pub is_comparison: bool,
    pub question_count: usize,
    pub detected_parts: Vec<String>,
    pub complexity_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: usize,
    pub namespaces: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub date: String,
    pub daily_total: f64,
    pub daily_limit: f64,
    pub limit_exceeded: bool,
    pub remaining_budget: f64,
}
