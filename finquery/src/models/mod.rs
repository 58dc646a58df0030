mod document;
mod search;

pub use document::{
    ChunkMetadata, Document, DocumentChunk, DocumentInfo, DocumentMetadata, IngestReport,
    RecordMetadata, VectorRecord,
};
pub use search::{
    CostSummary, IndexStats, QueryComplexity, QueryValidationResult, ResearchRequest,
    ResearchResponse, SearchMethod, SearchResult, SourceCitation,
};
