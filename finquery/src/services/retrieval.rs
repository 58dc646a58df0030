//! Hybrid retrieval: semantic nearest-neighbor search blended with a
//! keyword pass over the same index, plus optional reranking.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embeddings::{EmbeddingApiClient, RerankerProvider};
use crate::error::Result;
use crate::index::VectorIndexClient;
use crate::models::{SearchMethod, SearchResult};

/// Characters of chunk text submitted per rerank candidate.
const RERANK_TEXT_CHARS: usize = 500;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "has", "have", "what", "when", "where", "which", "who", "why", "how", "did",
    "does", "about", "with", "from", "this", "that", "these", "those", "will", "would", "could",
    "should", "their", "there", "been", "were", "its",
];

/// Everything one retrieval pass produced, including what it cost.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub results: Vec<SearchResult>,
    pub embedding_tokens: u64,
    pub rerank_used: bool,
}

pub struct HybridRetriever {
    embedder: Arc<EmbeddingApiClient>,
    index: Arc<VectorIndexClient>,
    reranker: Arc<RerankerProvider>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<EmbeddingApiClient>,
        index: Arc<VectorIndexClient>,
        reranker: Arc<RerankerProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            config,
        }
    }

    /// Retrieve up to `top_k` chunks for `query`. In hybrid mode candidates
    /// are pulled at twice the requested depth so the keyword pass and
    /// reranker have material to work with; with `use_hybrid` off a single
    /// semantic search at `top_k` is all that runs.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        use_hybrid: bool,
        use_reranking: bool,
        filter: Option<&Value>,
    ) -> Result<RetrievalOutcome> {
        let candidate_depth = if use_hybrid { top_k * 2 } else { top_k };
        let mut embedding_tokens = 0u64;

        let (query_vector, tokens) = self.embedder.embed_one(query).await?;
        embedding_tokens += tokens;
        let semantic = self
            .index
            .search(&query_vector, candidate_depth, filter)
            .await?;
        debug!(candidates = semantic.len(), "Semantic search complete");

        let keywords = if use_hybrid {
            extract_keywords(query)
        } else {
            Vec::new()
        };
        let keyword_hits = if keywords.is_empty() {
            Vec::new()
        } else {
            match self
                .keyword_search(&keywords, candidate_depth, top_k, filter)
                .await
            {
                Ok((hits, tokens)) => {
                    embedding_tokens += tokens;
                    hits
                }
                // Keyword search is an enrichment; degrade to semantic-only.
                Err(err) => {
                    warn!(error = %err, "Keyword search failed; using semantic results only");
                    Vec::new()
                }
            }
        };

        let merged = merge_results(semantic, keyword_hits, candidate_depth);

        let (results, rerank_used) = if use_reranking && self.reranker.is_enabled() {
            match self.rerank(query, &merged, top_k).await {
                Ok(reranked) => (reranked, true),
                Err(err) => {
                    warn!(error = %err, "Reranking failed; using merged order");
                    (merged.into_iter().take(top_k).collect(), false)
                }
            }
        } else {
            (merged.into_iter().take(top_k).collect(), false)
        };

        Ok(RetrievalOutcome {
            results,
            embedding_tokens,
            rerank_used,
        })
    }

    /// The index has no lexical search, so keywords are run through the
    /// same embedding path as a pseudo-query and the hits are re-scored by
    /// literal occurrence counts. Only the strongest `limit` hits feed the
    /// merge.
    async fn keyword_search(
        &self,
        keywords: &[String],
        depth: usize,
        limit: usize,
        filter: Option<&Value>,
    ) -> Result<(Vec<SearchResult>, u64)> {
        let pseudo_query = keywords.join(" ");
        let (vector, tokens) = self.embedder.embed_one(&pseudo_query).await?;
        let candidates = self.index.search(&vector, depth, filter).await?;
        let boosted = boost_keyword_hits(candidates, keywords, self.config.keyword_boost, limit);
        Ok((boosted, tokens))
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: &[SearchResult],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let documents: Vec<String> = candidates
            .iter()
            .map(|result| {
                let text: String = result.metadata.text.chars().take(RERANK_TEXT_CHARS).collect();
                format!(
                    "Document: {}, Page: {}\n{}",
                    result.metadata.document_name, result.metadata.page_number, text
                )
            })
            .collect();

        let scored = self.reranker.rerank(query, &documents, top_k).await?;

        let mut results = Vec::with_capacity(scored.len());
        for item in scored {
            let Some(candidate) = candidates.get(item.index) else {
                warn!(index = item.index, "Reranker returned out-of-range index");
                continue;
            };
            let mut result = candidate.clone();
            result.semantic_score = Some(result.relevance_score());
            result.rerank_score = Some(item.relevance_score);
            result.rerank_relevance = Some(item.relevance_score);
            result.score = item.relevance_score;
            results.push(result);
        }
        Ok(results)
    }
}

/// Content words of a query: lowercased, alphanumeric, longer than two
/// characters, stopwords removed, first occurrence order kept.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
    {
        if STOPWORDS.contains(&token) {
            continue;
        }
        if !seen.iter().any(|s| s == token) {
            seen.push(token.to_string());
        }
    }
    seen
}

/// Re-score candidates by literal keyword occurrences in their stored
/// text. Candidates with no matches are dropped; the rest gain
/// `boost * occurrences` and are re-sorted, keeping the top `limit`.
pub fn boost_keyword_hits(
    candidates: Vec<SearchResult>,
    keywords: &[String],
    boost: f32,
    limit: usize,
) -> Vec<SearchResult> {
    let mut hits: Vec<SearchResult> = candidates
        .into_iter()
        .filter_map(|mut result| {
            let text = result.metadata.text.to_lowercase();
            let mut occurrences = 0u32;
            let mut matched = Vec::new();
            for keyword in keywords {
                let count = text.matches(keyword.as_str()).count() as u32;
                if count > 0 {
                    occurrences += count;
                    matched.push(keyword.clone());
                }
            }
            if occurrences == 0 {
                return None;
            }
            result.score += boost * occurrences as f32;
            result.search_method = SearchMethod::Keyword;
            result.keyword_matches = occurrences;
            result.matched_keywords = matched;
            Some(result)
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

/// Merge the two passes, semantic results first. A keyword hit colliding
/// with a semantic result upgrades it to `hybrid` with the higher score
/// and the keyword evidence attached; keyword hits on documents semantic
/// search missed also enter as `hybrid`, since their score already blends
/// similarity with the occurrence boost.
pub fn merge_results(
    semantic: Vec<SearchResult>,
    keyword: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut merged = semantic;

    for hit in keyword {
        if let Some(existing) = merged.iter_mut().find(|r| r.id == hit.id) {
            existing.search_method = SearchMethod::Hybrid;
            existing.score = existing.score.max(hit.score);
            existing.keyword_matches = hit.keyword_matches;
            existing.matched_keywords = hit.matched_keywords;
        } else {
            let mut new_hit = hit;
            new_hit.search_method = SearchMethod::Hybrid;
            merged.push(new_hit);
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(limit);
    merged
}
