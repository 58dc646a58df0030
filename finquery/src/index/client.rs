use std::collections::HashMap;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{FinqueryError, Result};
use crate::models::{IndexStats, RecordMetadata, SearchMethod, SearchResult, VectorRecord};

const METRIC: &str = "cosine";
const API_KEY_HEADER: &str = "Api-Key";
/// Bounded wait for a deleted index to disappear from the control plane.
const DELETE_POLL_SECS: u64 = 30;
/// Bounded wait for a freshly created index to report ready.
const READY_POLL_SECS: u64 = 60;
const POLL_INTERVAL_SECS: u64 = 2;

/// REST client for the hosted vector index. Index lifecycle goes through
/// the control plane; vector operations go to the per-index data-plane
/// host, resolved once and cached.
pub struct VectorIndexClient {
    client: Client,
    config: IndexConfig,
    host: OnceCell<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[allow(dead_code)]
    name: String,
    dimension: usize,
    host: String,
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    ready: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

impl VectorIndexClient {
    pub fn new(config: IndexConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| FinqueryError::Config("PINECONE_API_KEY is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key_value = HeaderValue::from_str(&api_key)
            .map_err(|e| FinqueryError::Config(format!("Invalid index API key: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| FinqueryError::Index(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            host: OnceCell::new(),
        })
    }

    /// Make sure the configured index exists with the expected dimension,
    /// creating it when missing. An index whose dimension already matches
    /// is left intact even with `force_recreate`; the flag only authorizes
    /// deleting and rebuilding a mismatched one. Both lifecycle waits are
    /// bounded; on timeout we warn and proceed rather than fail, since the
    /// index usually settles moments later.
    pub async fn ensure_index(&self, dimension: usize, force_recreate: bool) -> Result<()> {
        let existing = self.describe_index().await?;

        if let Some(description) = &existing {
            if description.dimension == dimension {
                debug!(index = %self.config.index_name, "Index already exists");
                return Ok(());
            }
            if !force_recreate {
                return Err(FinqueryError::Config(format!(
                    "Index '{}' has dimension {} but the embedding model requires {}; \
                     re-ingest with force_recreate to rebuild it",
                    self.config.index_name, description.dimension, dimension
                )));
            }
            info!(
                index = %self.config.index_name,
                existing_dimension = description.dimension,
                "Deleting index for dimension change"
            );
            self.delete_index().await?;
            self.wait_for_deletion().await;
        }

        info!(
            index = %self.config.index_name,
            dimension,
            "Creating vector index"
        );
        let body = CreateIndexRequest {
            name: &self.config.index_name,
            dimension,
            metric: METRIC,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.config.cloud,
                    region: &self.config.region,
                },
            },
        };
        let url = format!("{}/indexes", self.config.control_url);
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() && status != StatusCode::CONFLICT {
            let text = resp.text().await.unwrap_or_default();
            return Err(FinqueryError::Index(format!(
                "Index creation failed ({status}): {text}"
            )));
        }

        self.wait_for_ready().await;
        Ok(())
    }

    /// Write vectors in batches of `upsert_batch_size`, returning the
    /// total count accepted. Any batch failure aborts the remainder.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let host = self.data_plane_url().await?;
        let url = format!("{host}/vectors/upsert");

        let mut total = 0usize;
        for batch in records.chunks(self.config.upsert_batch_size.max(1)) {
            let body = UpsertRequest {
                vectors: batch,
                namespace: &self.config.namespace,
            };
            let resp = self.client.post(&url).json(&body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(FinqueryError::Index(format!(
                    "Upsert failed ({status}): {text}"
                )));
            }
            let parsed: UpsertResponse = resp.json().await?;
            total += parsed.upserted_count;
            debug!(batch = batch.len(), total, "Upserted vector batch");
        }
        Ok(total)
    }

    /// Nearest-neighbor search. Scores are cosine similarity in [-1, 1],
    /// in practice [0, 1] for normalized embeddings.
    pub async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>> {
        let host = self.data_plane_url().await?;
        let url = format!("{host}/query");
        let body = QueryRequest {
            vector,
            top_k,
            namespace: &self.config.namespace,
            include_metadata: true,
            filter,
        };

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FinqueryError::Index(format!(
                "Query failed ({status}): {text}"
            )));
        }

        let parsed: QueryResponse = resp.json().await?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| {
                SearchResult::new(
                    m.id,
                    m.score,
                    parse_record_metadata(&m.metadata),
                    SearchMethod::Semantic,
                )
            })
            .collect())
    }

    /// Remove every vector in the configured namespace.
    pub async fn delete_all(&self) -> Result<()> {
        let host = self.data_plane_url().await?;
        let url = format!("{host}/vectors/delete");
        let body = DeleteRequest {
            delete_all: true,
            namespace: &self.config.namespace,
        };
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FinqueryError::Index(format!(
                "Delete failed ({status}): {text}"
            )));
        }
        info!(namespace = %self.config.namespace, "Cleared vector namespace");
        Ok(())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let host = self.data_plane_url().await?;
        let url = format!("{host}/describe_index_stats");
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FinqueryError::Index(format!(
                "Stats request failed ({status}): {text}"
            )));
        }
        let parsed: StatsResponse = resp.json().await?;
        Ok(IndexStats {
            total_vector_count: parsed.total_vector_count,
            dimension: parsed.dimension,
            namespaces: parsed
                .namespaces
                .into_iter()
                .map(|(name, ns)| (name, ns.vector_count))
                .collect(),
        })
    }

    async fn data_plane_url(&self) -> Result<String> {
        let host = self
            .host
            .get_or_try_init(|| async {
                if let Some(host) = &self.config.host {
                    return Ok::<_, FinqueryError>(host.clone());
                }
                let description = self.describe_index().await?.ok_or_else(|| {
                    FinqueryError::NotFound(format!(
                        "Index '{}' does not exist; run ingestion first",
                        self.config.index_name
                    ))
                })?;
                Ok(description.host)
            })
            .await?;

        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(host.clone())
        } else {
            Ok(format!("https://{host}"))
        }
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_url, self.config.index_name
        );
        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(FinqueryError::Index(format!(
                    "Describe index failed ({status}): {text}"
                )))
            }
        }
    }

    async fn delete_index(&self) -> Result<()> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_url, self.config.index_name
        );
        let resp = self.client.delete(&url).send().await?;
        let status = resp.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let text = resp.text().await.unwrap_or_default();
            return Err(FinqueryError::Index(format!(
                "Index deletion failed ({status}): {text}"
            )));
        }
        Ok(())
    }

    async fn wait_for_deletion(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(DELETE_POLL_SECS);
        loop {
            match self.describe_index().await {
                Ok(None) => return,
                Ok(Some(_)) => {}
                Err(err) => {
                    warn!(error = %err, "Deletion poll failed; proceeding");
                    return;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    index = %self.config.index_name,
                    "Index still listed after {DELETE_POLL_SECS}s; proceeding"
                );
                return;
            }
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }

    async fn wait_for_ready(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(READY_POLL_SECS);
        loop {
            match self.describe_index().await {
                Ok(Some(description)) if description.status.ready => {
                    info!(index = %self.config.index_name, "Index is ready");
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "Readiness poll failed; proceeding");
                    return;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    index = %self.config.index_name,
                    "Index not ready after {READY_POLL_SECS}s; proceeding"
                );
                return;
            }
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }
}

/// Index metadata comes back with every number as a float; coerce the
/// integral fields instead of failing strict deserialization.
fn parse_record_metadata(value: &Value) -> RecordMetadata {
    let get_str = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let get_u64 = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
            .unwrap_or_default()
    };
    RecordMetadata {
        document_name: get_str("document_name"),
        page_number: get_u64("page_number") as u32,
        chunk_index: get_u64("chunk_index") as usize,
        total_pages: get_u64("total_pages") as u32,
        text: get_str("text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record_metadata_coerces_floats() {
        let value = json!({
            "document_name": "10k.pdf",
            "page_number": 12.0,
            "chunk_index": 3.0,
            "total_pages": 90.0,
            "text": "Revenue grew 14% year over year."
        });
        let metadata = parse_record_metadata(&value);
        assert_eq!(metadata.document_name, "10k.pdf");
        assert_eq!(metadata.page_number, 12);
        assert_eq!(metadata.chunk_index, 3);
        assert_eq!(metadata.total_pages, 90);
    }

    #[test]
    fn test_parse_record_metadata_tolerates_missing_fields() {
        let metadata = parse_record_metadata(&json!({}));
        assert_eq!(metadata.document_name, "");
        assert_eq!(metadata.page_number, 0);
        assert!(metadata.text.is_empty());
    }

    #[test]
    fn test_query_request_serializes_camel_case() {
        let vector = vec![0.1f32, 0.2];
        let req = QueryRequest {
            vector: &vector,
            top_k: 5,
            namespace: "",
            include_metadata: true,
            filter: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["topK"], 5);
        assert_eq!(value["includeMetadata"], true);
        assert!(value.get("filter").is_none());
    }
}
