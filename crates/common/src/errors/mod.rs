//! Error types for DocChat
//!
//! One error enum covers both phases:
//! - build time (acquisition, PDF extraction, index build) where every error is fatal
//! - query time (retrieval, rerank, generation) where errors degrade or surface per turn
//!
//! Every variant maps to a machine-readable [`ErrorCode`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Acquisition errors (1xxx)
    AcquisitionFailed,
    MalformedLocator,
    NotAPdf,

    // Extraction & indexing errors (2xxx)
    PdfParseError,
    IndexBuildFailed,
    IndexLoadFailed,
    StorageError,

    // Query-time errors (3xxx)
    RetrievalFailed,
    RerankFailed,
    GenerationFailed,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    IoError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::AcquisitionFailed => 1001,
            ErrorCode::MalformedLocator => 1002,
            ErrorCode::NotAPdf => 1003,

            ErrorCode::PdfParseError => 2001,
            ErrorCode::IndexBuildFailed => 2002,
            ErrorCode::IndexLoadFailed => 2003,
            ErrorCode::StorageError => 2004,

            ErrorCode::RetrievalFailed => 3001,
            ErrorCode::RerankFailed => 3002,
            ErrorCode::GenerationFailed => 3003,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Acquisition errors
    #[error("Failed to acquire document from {url}: {message}")]
    Acquisition { url: String, message: String },

    #[error("Malformed source locator '{locator}': {reason}")]
    MalformedLocator { locator: String, reason: String },

    #[error("Downloaded payload from {url} is not a PDF")]
    NotAPdf { url: String },

    // Extraction & indexing errors
    #[error("PDF parse error for {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("Index build failed: {message}")]
    IndexBuild { message: String },

    #[error("Failed to load index from {path}: {message}")]
    IndexLoad { path: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    // Query-time errors
    #[error("Retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Rerank failed: {message}")]
    Rerank { message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Acquisition { .. } => ErrorCode::AcquisitionFailed,
            AppError::MalformedLocator { .. } => ErrorCode::MalformedLocator,
            AppError::NotAPdf { .. } => ErrorCode::NotAPdf,
            AppError::Pdf { .. } => ErrorCode::PdfParseError,
            AppError::IndexBuild { .. } => ErrorCode::IndexBuildFailed,
            AppError::IndexLoad { .. } => ErrorCode::IndexLoadFailed,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::Retrieval { .. } => ErrorCode::RetrievalFailed,
            AppError::Rerank { .. } => ErrorCode::RerankFailed,
            AppError::Generation { .. } => ErrorCode::GenerationFailed,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::IoError,
        }
    }

    /// Whether this error belongs to the acquisition family (fatal to the build phase)
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            AppError::Acquisition { .. } | AppError::MalformedLocator { .. } | AppError::NotAPdf { .. }
        )
    }

    /// Whether a chat session can keep going after this error
    pub fn is_recoverable_in_session(&self) -> bool {
        matches!(
            self,
            AppError::Retrieval { .. }
                | AppError::Rerank { .. }
                | AppError::Generation { .. }
                | AppError::EmbeddingError { .. }
                | AppError::HttpClient(_)
        )
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        AppError::Retrieval { message: message.into() }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        AppError::Generation { message: message.into() }
    }

    pub fn rerank(message: impl Into<String>) -> Self {
        AppError::Rerank { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AppError::Storage { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::MalformedLocator {
            locator: "not a url".into(),
            reason: "missing scheme".into(),
        };
        assert_eq!(err.code(), ErrorCode::MalformedLocator);
        assert_eq!(err.code().as_code(), 1002);
        assert!(err.is_acquisition());
        assert!(!err.is_recoverable_in_session());
    }

    #[test]
    fn test_query_time_errors_are_recoverable() {
        assert!(AppError::retrieval("vector store offline").is_recoverable_in_session());
        assert!(AppError::generation("timeout").is_recoverable_in_session());
        assert!(AppError::rerank("bad status").is_recoverable_in_session());
        assert!(!AppError::IndexBuild { message: "x".into() }.is_recoverable_in_session());
    }

    #[test]
    fn test_error_messages() {
        let err = AppError::IndexLoad {
            path: "merging_index".into(),
            message: "docstore.json missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load index from merging_index: docstore.json missing"
        );
    }
}
