use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{FinqueryError, Result};

/// One reranked candidate, addressed by its index in the submitted list.
#[derive(Debug, Clone)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

#[derive(Clone)]
enum RerankerBackend {
    Cohere {
        client: Client,
        base_url: String,
        api_key: String,
        model: String,
    },
    Mock(Arc<Vec<RerankResult>>),
}

/// Relevance reranking as a capability-gated strategy: constructed from
/// config only when a credential is present, otherwise a passthrough
/// that callers detect via [`is_enabled`](Self::is_enabled).
#[derive(Clone)]
pub struct RerankerProvider {
    backend: Option<RerankerBackend>,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseItem>,
}

#[derive(Debug, Deserialize)]
struct RerankResponseItem {
    index: usize,
    relevance_score: f32,
}

impl RerankerProvider {
    pub fn new(config: Option<&RerankerConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self { backend: None });
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinqueryError::Reranker(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            backend: Some(RerankerBackend::Cohere {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Score `documents` against `query`, returning up to `top_n` results
    /// ordered by relevance. Indices refer to the submitted list.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| FinqueryError::Reranker("Reranker is not enabled".to_string()))?;

        if documents.is_empty() {
            return Ok(Vec::new());
        }

        match backend {
            RerankerBackend::Cohere {
                client,
                base_url,
                api_key,
                model,
            } => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                        FinqueryError::Reranker(format!("Invalid API key header: {e}"))
                    })?,
                );

                let url = format!("{base_url}/v1/rerank");
                let request = RerankRequest {
                    model,
                    query,
                    documents,
                    top_n,
                };

                let resp = client
                    .post(&url)
                    .headers(headers)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| FinqueryError::Reranker(format!("Rerank request failed: {e}")))?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(FinqueryError::Reranker(format!(
                        "Rerank API error {status}: {body}"
                    )));
                }

                let body: RerankResponse = resp.json().await.map_err(|e| {
                    FinqueryError::Reranker(format!("Failed to parse rerank response: {e}"))
                })?;

                Ok(body
                    .results
                    .into_iter()
                    .map(|item| RerankResult {
                        index: item.index,
                        relevance_score: item.relevance_score,
                    })
                    .collect())
            }
            RerankerBackend::Mock(results) => Ok(results.iter().take(top_n).cloned().collect()),
        }
    }

    pub fn new_mock(results: Vec<RerankResult>) -> Self {
        Self {
            backend: Some(RerankerBackend::Mock(Arc::new(results))),
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }
}
