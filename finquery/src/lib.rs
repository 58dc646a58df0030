//! Retrieval-augmented research over financial PDF filings: ingestion,
//! hybrid retrieval with optional reranking, grounded answer generation,
//! and daily spend accounting.

pub mod config;
pub mod cost;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod processing;
pub mod security;
pub mod services;

pub use config::Config;
pub use error::{FinqueryError, Result};
