use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinqueryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Daily cost limit exceeded: ${spent:.2} of ${limit:.2}")]
    BudgetExceeded { spent: f64, limit: f64 },

    #[error("API rate limit exceeded, retry after {retry_after:?} seconds")]
    ApiRateLimit { retry_after: Option<u64> },

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FinqueryError {
    /// True for failures a caller can fix by changing its input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            FinqueryError::Validation(_) | FinqueryError::NotFound(_)
        )
    }

    /// True for transient upstream failures that may succeed on retry.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FinqueryError::Embedding(_)
                | FinqueryError::Index(_)
                | FinqueryError::Llm(_)
                | FinqueryError::Reranker(_)
                | FinqueryError::Http(_)
                | FinqueryError::ApiRateLimit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FinqueryError>;
