mod api;
mod reranker;

#[cfg(test)]
mod tests;

pub use api::{EmbeddingApiClient, EmbeddingApiConfig, EmbeddingBatch};
pub use reranker::{RerankResult, RerankerProvider};
