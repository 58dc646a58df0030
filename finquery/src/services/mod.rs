//! Pipeline services: ingestion, hybrid retrieval, answer generation, and
//! the research orchestrator that ties them together.

pub mod answer;
pub mod ingestion;
pub mod research;
pub mod retrieval;

pub use answer::AnswerGenerator;
pub use ingestion::IngestionService;
pub use research::ResearchService;
pub use retrieval::HybridRetriever;
