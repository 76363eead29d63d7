use thiserror::Error;

/// Errors returned by try-on API operations.
#[derive(Error, Debug)]
pub enum TryOnError {
    /// The server returned a non-success HTTP status.
    #[error("Server returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The status endpoint has no record of this session (HTTP 404).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The response was missing expected fields or had unexpected values.
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A retry was requested before any generation was started.
    #[error("No previous request to retry")]
    NoPreviousRequest,
}

impl TryOnError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TryOnError::SessionNotFound(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TryOnError>;
