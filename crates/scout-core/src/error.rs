use thiserror::Error;

/// Application-wide error types for Scout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The target is not a public http(s) address and was never requested.
    #[error("Blocked URL: {0}")]
    BlockedUrl(String),

    /// The document could not be evaluated for the title rule.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// The scrape queue is full and its overflow policy rejects new entries.
    #[error("Scrape queue is full ({capacity} entries)")]
    QueueOverflow { capacity: usize },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for the fetch class of failures: network, timeout, a
    /// non-success HTTP status, or a blocked target.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::BlockedUrl(_)
        )
    }

    /// Returns true if this error is transient and a later attempt may succeed.
    ///
    /// The pipeline itself never retries; callers use this to pick a log level.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpError(msg) => {
                msg.contains("HTTP 429") || msg.contains("HTTP 5") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
