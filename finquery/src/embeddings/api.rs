use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::error::{FinqueryError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Retry schedule for transient failures: exponential backoff from a 4s
/// base, capped at 10s per wait.
const RETRY_BASE_MS: u64 = 4_000;
const RETRY_CAP_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct EmbeddingApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub retry_base_ms: u64,
}

impl EmbeddingApiConfig {
    pub fn from_openai_config(config: &OpenAiConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            timeout_secs: config.timeout_secs,
            max_attempts: config.max_attempts.max(1),
            retry_base_ms: RETRY_BASE_MS,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
}

/// Embeddings for one request, with the token usage the API reported so
/// the cost ledger can record true spend.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    config: EmbeddingApiConfig,
}

impl EmbeddingApiClient {
    pub fn new(config: EmbeddingApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinqueryError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Embed a batch of texts in a single request, preserving input order.
    /// Newlines are stripped; any text that is empty after cleaning fails
    /// the whole call.
    pub async fn embed(&self, texts: &[&str]) -> Result<EmbeddingBatch> {
        let cleaned = clean_inputs(texts)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref api_key) = self.config.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| FinqueryError::Embedding(format!("Invalid API key header: {e}")))?,
            );
        }

        let url = format!("{}/embeddings", self.config.base_url);
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: &cleaned,
        };

        let mut last_error = None;
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let delay =
                    (self.config.retry_base_ms * 2_u64.pow(attempt - 2)).min(RETRY_CAP_MS);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body: EmbeddingResponse = resp.json().await.map_err(|e| {
                            FinqueryError::Embedding(format!("Failed to parse response: {e}"))
                        })?;
                        if body.data.len() != cleaned.len() {
                            return Err(FinqueryError::Embedding(format!(
                                "Expected {} embeddings, got {}",
                                cleaned.len(),
                                body.data.len()
                            )));
                        }
                        return Ok(EmbeddingBatch {
                            vectors: body.data.into_iter().map(|d| d.embedding).collect(),
                            total_tokens: body.usage.prompt_tokens,
                        });
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());
                        last_error = Some(FinqueryError::ApiRateLimit { retry_after });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(FinqueryError::ApiAuth(body));
                    }

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_error = Some(FinqueryError::Embedding(format!(
                            "Server error {status}: {body}"
                        )));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(FinqueryError::Embedding(format!("API error {status}: {body}")));
                }
                Err(e) => {
                    last_error = Some(FinqueryError::Embedding(format!("Request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FinqueryError::Embedding("Embedding request failed".to_string())))
    }

    /// Embed one text and return its vector plus reported token usage.
    pub async fn embed_one(&self, text: &str) -> Result<(Vec<f32>, u64)> {
        let batch = self.embed(&[text]).await?;
        let tokens = batch.total_tokens;
        batch
            .vectors
            .into_iter()
            .next()
            .map(|v| (v, tokens))
            .ok_or_else(|| FinqueryError::Embedding("No embedding returned".to_string()))
    }

    /// Embed many texts by issuing one request per fixed-size group,
    /// concatenating results in input order. Any group failure aborts the
    /// whole call; no partial success is returned.
    pub async fn embed_batch(&self, texts: &[&str], batch_size: usize) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                total_tokens: 0,
            });
        }

        let batch_size = batch_size.max(1);
        let group_count = texts.len().div_ceil(batch_size);
        tracing::info!(
            texts = texts.len(),
            batch_size,
            groups = group_count,
            "Generating embeddings in batches"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        let mut total_tokens = 0u64;

        for (group_idx, group) in texts.chunks(batch_size).enumerate() {
            let mut batch = self.embed(group).await.map_err(|e| {
                tracing::error!(group = group_idx + 1, groups = group_count, error = %e, "Embedding batch failed");
                e
            })?;
            vectors.append(&mut batch.vectors);
            total_tokens += batch.total_tokens;
            tracing::debug!(group = group_idx + 1, groups = group_count, "Processed embedding batch");
        }

        Ok(EmbeddingBatch {
            vectors,
            total_tokens,
        })
    }
}

fn clean_inputs(texts: &[&str]) -> Result<Vec<String>> {
    texts
        .iter()
        .map(|text| {
            let cleaned = text.replace('\n', " ").trim().to_string();
            if cleaned.is_empty() {
                Err(FinqueryError::Validation(
                    "Cannot generate embedding for empty text".to_string(),
                ))
            } else {
                Ok(cleaned)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_inputs_strips_newlines() {
        let cleaned = clean_inputs(&["line one\nline two", "  padded  "]).unwrap();
        assert_eq!(cleaned, vec!["line one line two", "padded"]);
    }

    #[test]
    fn test_clean_inputs_rejects_empty() {
        let err = clean_inputs(&["valid", "\n \n"]).unwrap_err();
        assert!(matches!(err, FinqueryError::Validation(_)));
    }
}
