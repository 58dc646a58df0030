//! Ingestion: parse a PDF, chunk it, embed the chunks, and write the
//! vectors, accounting for embedding spend along the way.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::{embedding_dimension, Config};
use crate::cost::CostLedger;
use crate::embeddings::EmbeddingApiClient;
use crate::error::{FinqueryError, Result};
use crate::index::VectorIndexClient;
use crate::models::{DocumentChunk, IngestReport, RecordMetadata, VectorRecord};
use crate::processing::{load_document, DocumentChunker};

pub struct IngestionService {
    embedder: Arc<EmbeddingApiClient>,
    index: Arc<VectorIndexClient>,
    ledger: Arc<CostLedger>,
    config: Arc<Config>,
}

impl IngestionService {
    pub fn new(
        embedder: Arc<EmbeddingApiClient>,
        index: Arc<VectorIndexClient>,
        ledger: Arc<CostLedger>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            embedder,
            index,
            ledger,
            config,
        }
    }

    /// Ingest one PDF end to end. The index is created on first use; with
    /// `force_recreate` a dimension-mismatched index is rebuilt first.
    pub async fn ingest_file(&self, path: &Path, force_recreate: bool) -> Result<IngestReport> {
        let (exceeded, spent, limit) = self.ledger.check_limit();
        if exceeded {
            return Err(FinqueryError::BudgetExceeded { spent, limit });
        }

        let document = load_document(path)?;
        let chunker = DocumentChunker::new(&self.config.processing);
        let chunks = chunker.chunk_document(&document);
        if chunks.is_empty() {
            return Err(FinqueryError::Validation(format!(
                "No text could be extracted from '{}'",
                document.filename
            )));
        }
        info!(
            filename = %document.filename,
            pages = document.num_pages,
            chunks = chunks.len(),
            "Document chunked"
        );

        let dimension = embedding_dimension(self.embedder.model())?;
        self.index.ensure_index(dimension, force_recreate).await?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let batch = self
            .embedder
            .embed_batch(&texts, self.config.processing.embed_batch_size)
            .await?;

        let records = self.build_records(&chunks, batch.vectors);
        let upserted = self.index.upsert(&records).await?;

        let cost_usd =
            batch.total_tokens as f64 / 1000.0 * self.config.cost.embedding_per_1k_tokens;
        self.ledger.add_cost(cost_usd, None, "openai-embeddings");

        info!(
            filename = %document.filename,
            vectors = upserted,
            cost_usd = format!("{cost_usd:.4}"),
            "Document ingested"
        );

        Ok(IngestReport {
            filename: document.filename,
            num_pages: document.num_pages,
            chunks_created: chunks.len(),
            vectors_upserted: upserted,
            cost_usd,
        })
    }

    fn build_records(
        &self,
        chunks: &[DocumentChunk],
        vectors: Vec<Vec<f32>>,
    ) -> Vec<VectorRecord> {
        let text_limit = self.config.retrieval.metadata_text_limit;
        chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.chunk_id.clone(),
                values,
                metadata: RecordMetadata {
                    document_name: chunk.metadata.document_name.clone(),
                    page_number: chunk.metadata.page_number,
                    chunk_index: chunk.metadata.chunk_index,
                    total_pages: chunk.metadata.total_pages,
                    text: chunk.text.chars().take(text_limit).collect(),
                },
            })
            .collect()
    }
}
