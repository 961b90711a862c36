//! Error types for the wallet analyzer

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet analyzer
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Request validation errors
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Wallet {0} has no transactions to analyze")]
    EmptyHistory(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Dataset errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    // Model artifact errors
    #[error("Model error: {0}")]
    Model(String),

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    // Similarity index errors
    #[error("Index error: {0}")]
    Index(String),

    #[error("Index dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Remote service errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Remote service returned {status}: {body}")]
    Remote { status: u16, body: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_) | Error::EmptyHistory(_) | Error::InvalidRequest(_)
        )
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from bincode errors (index snapshots)
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Index(e.to_string())
    }
}

// Conversion from csv errors
impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Dataset(e.to_string())
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(Error::InvalidAddress("0x1".into()).is_client_error());
        assert!(Error::EmptyHistory("0x1".into()).is_client_error());
        assert!(!Error::Model("broken".into()).is_client_error());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::Http("connection refused".into()).is_retryable());
        assert!(Error::Remote { status: 503, body: String::new() }.is_retryable());
        assert!(!Error::Remote { status: 400, body: String::new() }.is_retryable());
        assert!(!Error::Index("corrupt".into()).is_retryable());
    }

    #[test]
    fn test_converts_into_anyhow_at_the_edge() {
        let err: anyhow::Error = Error::EmptyHistory("0x1".into()).into();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyHistory(_))));
    }
}
