use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parsing failed for '{path}': {message}")]
    Parsing { path: String, message: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("strategy not found: {0}")]
    StrategyNotFound(String),

    /// Holds the full rendered validation report, every issue included.
    #[error("strategy definition failed validation:\n{0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn parsing(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parsing { path: path.into(), message: message.to_string() }
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::VectorStore(message.to_string())
    }
}

/// Failures reported by an embedding backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbedError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("rate limited by backend")]
    RateLimited,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error("embedder returned {got} vectors for {expected} inputs")]
    CountMismatch { got: usize, expected: usize },
}

impl EmbedError {
    /// Timeouts and rate limits are worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_error_is_tagged_with_path() {
        let err = Error::parsing("/data/a.pdf", "unsupported encoding");
        assert_eq!(err.to_string(), "parsing failed for '/data/a.pdf': unsupported encoding");
    }

    #[test]
    fn transient_embed_errors() {
        assert!(EmbedError::Timeout(500).is_transient());
        assert!(EmbedError::RateLimited.is_transient());
        assert!(!EmbedError::Backend("boom".into()).is_transient());
        assert!(!EmbedError::DimensionMismatch { got: 3, expected: 4 }.is_transient());
    }

    #[test]
    fn embed_error_converts_into_error() {
        let err: Error = EmbedError::RateLimited.into();
        assert!(matches!(err, Error::Embedding(EmbedError::RateLimited)));
        assert!(err.to_string().contains("rate limited"));
    }
}
