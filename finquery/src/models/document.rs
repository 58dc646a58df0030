use serde::{Deserialize, Serialize};

/// A parsed PDF with page-tagged text. Created once at ingestion and
/// never persisted; only its derived chunks reach the index.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    /// One entry per page, in page order.
    pub pages: Vec<String>,
    pub num_pages: u32,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub num_pages: u32,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// A bounded slice of a document's text, the atomic retrieval unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// `<filename>::chunk_<index>` — deterministic, so re-ingestion of
    /// the same file overwrites rather than duplicates.
    pub chunk_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_name: String,
    /// Page active when the chunk was cut. Approximate for chunks that
    /// straddle a page boundary.
    pub page_number: u32,
    pub chunk_index: usize,
    pub total_pages: u32,
}

/// One record in the vector index. Written at ingestion, overwritten on
/// re-ingestion of the same chunk id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Chunk metadata as stored alongside the vector, including a truncated
/// copy of the text for keyword matching and citation display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub document_name: String,
    pub page_number: u32,
    pub chunk_index: usize,
    pub total_pages: u32,
    pub text: String,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub num_pages: u32,
    pub chunks_created: usize,
    pub vectors_upserted: usize,
    pub cost_usd: f64,
}

/// A document known to the system, for listing.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl DocumentChunk {
    pub fn chunk_id_for(document_name: &str, chunk_index: usize) -> String {
        format!("{document_name}::chunk_{chunk_index}")
    }
}
