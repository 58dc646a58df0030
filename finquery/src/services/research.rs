//! The research pipeline: validate, retrieve, answer, account. Source
//! citations are relevance-filtered at this boundary, and suspicious
//! queries get an answer but no citations.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::cost::CostLedger;
use crate::embeddings::EmbeddingApiClient;
use crate::error::{FinqueryError, Result};
use crate::index::VectorIndexClient;
use crate::models::{DocumentInfo, ResearchRequest, ResearchResponse, SourceCitation};
use crate::security::{analyze_query_complexity, validate_query, validate_top_k};
use crate::services::answer::AnswerGenerator;
use crate::services::retrieval::HybridRetriever;

/// Characters of chunk text returned per citation.
const CITATION_TEXT_CHARS: usize = 500;
/// Threat score above which citations are withheld from the response.
const SOURCE_SUPPRESSION_THRESHOLD: f32 = 0.5;
/// Probe query used to sample the index when listing known documents.
const DOCUMENT_PROBE_QUERY: &str = "financial document company";
const DOCUMENT_PROBE_DEPTH: usize = 500;

pub struct ResearchService {
    retriever: HybridRetriever,
    answerer: AnswerGenerator,
    embedder: Arc<EmbeddingApiClient>,
    index: Arc<VectorIndexClient>,
    ledger: Arc<CostLedger>,
    config: Arc<Config>,
}

impl ResearchService {
    pub fn new(
        retriever: HybridRetriever,
        answerer: AnswerGenerator,
        embedder: Arc<EmbeddingApiClient>,
        index: Arc<VectorIndexClient>,
        ledger: Arc<CostLedger>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            retriever,
            answerer,
            embedder,
            index,
            ledger,
            config,
        }
    }

    pub async fn research(&self, request: &ResearchRequest) -> Result<ResearchResponse> {
        // Budget gate before any paid work.
        let (exceeded, spent, limit) = self.ledger.check_limit();
        if exceeded {
            return Err(FinqueryError::BudgetExceeded { spent, limit });
        }

        let validation = validate_query(&request.query);
        if !validation.is_valid {
            return Err(FinqueryError::Validation(validation.warnings.join("; ")));
        }
        if validation.threat_score > 0.0 {
            warn!(
                threat_score = validation.threat_score,
                warnings = ?validation.warnings,
                "Query flagged by injection screening"
            );
        }

        let top_k = validate_top_k(request.top_k, self.config.retrieval.max_top_k)?;
        let query = &validation.sanitized_query;
        let complexity = analyze_query_complexity(query);
        let request_id = Uuid::new_v4().to_string();

        info!(
            request_id = %request_id,
            top_k,
            use_hybrid = request.use_hybrid,
            use_reranking = request.use_reranking,
            multi_part = complexity.is_multi_part,
            "Research query accepted"
        );
        debug!(
            request_id = %request_id,
            estimated_cost_usd = format!("{:.4}", self.estimate_query_cost(query, top_k)),
            "Expected spend before retrieval"
        );

        let retrieval = self
            .retriever
            .retrieve(
                query,
                top_k,
                request.use_hybrid,
                request.use_reranking,
                request.filter.as_ref(),
            )
            .await?;

        let generated = self
            .answerer
            .generate(query, &retrieval.results, &complexity)
            .await?;

        let mut cost_usd = generated.cost_usd
            + retrieval.embedding_tokens as f64 / 1000.0 * self.config.cost.embedding_per_1k_tokens
            + retrieval.results.len() as f64 * self.config.cost.index_per_result;
        if retrieval.rerank_used {
            if let Some(reranker) = &self.config.reranker {
                cost_usd += reranker.cost_per_call_usd;
            }
        }
        let receipt = self.ledger.add_cost(cost_usd, Some(&request_id), "research");

        let sources = if validation.threat_score > SOURCE_SUPPRESSION_THRESHOLD {
            warn!(
                request_id = %request_id,
                threat_score = validation.threat_score,
                "Withholding source citations for suspicious query"
            );
            Vec::new()
        } else {
            let threshold = self.config.retrieval.relevance_threshold;
            retrieval
                .results
                .iter()
                .filter(|result| result.relevance_score() >= threshold)
                .map(|result| SourceCitation {
                    document_name: result.metadata.document_name.clone(),
                    page_number: result.metadata.page_number,
                    text: result.metadata.text.chars().take(CITATION_TEXT_CHARS).collect(),
                    score: result.score,
                    search_method: result.search_method,
                    matched_keywords: result.matched_keywords.clone(),
                })
                .collect()
        };

        info!(
            request_id = %request_id,
            sources = sources.len(),
            cost_usd = format!("{:.4}", receipt.amount),
            daily_total = format!("{:.2}", receipt.daily_total),
            "Research query complete"
        );

        Ok(ResearchResponse {
            answer: generated.answer,
            sources,
            query: request.query.clone(),
            cost_usd,
        })
    }

    /// Documents known to the system: names sampled from index metadata,
    /// cross-checked against the documents directory. Falls back to a
    /// plain directory listing when the index is unreachable.
    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let mut names: Vec<String> = match self.probe_index_documents().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "Index probe failed; listing documents from disk");
                list_pdf_files(&self.config.documents_dir)?
            }
        };
        names.sort();
        names.dedup();

        let docs_dir = self.config.documents_dir.as_path();
        Ok(names
            .into_iter()
            .map(|name| {
                let path = docs_dir.join(&name);
                let file_size = path.metadata().ok().map(|m| m.len());
                DocumentInfo {
                    status: if file_size.is_some() {
                        "available".to_string()
                    } else {
                        "missing".to_string()
                    },
                    name,
                    file_size,
                }
            })
            .collect())
    }

    async fn probe_index_documents(&self) -> Result<Vec<String>> {
        let (vector, _) = self.embedder.embed_one(DOCUMENT_PROBE_QUERY).await?;
        let results = self.index.search(&vector, DOCUMENT_PROBE_DEPTH, None).await?;
        Ok(results
            .into_iter()
            .map(|r| r.metadata.document_name)
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Rough upper-bound cost of answering one query, for display before
    /// committing to it. Assumes a full context window and answer.
    pub fn estimate_query_cost(&self, query: &str, top_k: usize) -> f64 {
        let cost = &self.config.cost;
        // Two embedding calls (query + keyword pseudo-query), estimated at
        // one token per four characters.
        let embed_tokens = (query.len().div_ceil(4) * 2) as f64;
        let context_tokens =
            (top_k * self.config.retrieval.metadata_text_limit).div_ceil(4) as f64;
        let answer_tokens = 1000.0;

        embed_tokens / 1000.0 * cost.embedding_per_1k_tokens
            + context_tokens / 1000.0 * cost.llm_input_per_1k_tokens
            + answer_tokens / 1000.0 * cost.llm_output_per_1k_tokens
            + top_k as f64 * cost.index_per_result
            + self
                .config
                .reranker
                .as_ref()
                .map(|r| r.cost_per_call_usd)
                .unwrap_or(0.0)
    }
}

fn list_pdf_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.to_lowercase().ends_with(".pdf") {
            names.push(name);
        }
    }
    Ok(names)
}
