//! Error types for the CDSS workspace.
//!
//! A single error enum covers every failure category of the system. The
//! collaborator failures of the answering pipeline get their own variants so
//! callers can tell an unreachable service apart from a failed generation.
//! "No relevant chunks" is not an error and has no variant here.

use thiserror::Error;

/// Unified error type for the CDSS workspace.
///
/// All fallible functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding model could not be loaded or verified
    #[error("Initialization failure: {0}")]
    Initialization(String),

    /// Vector index or completion service unreachable
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    /// Completion service returned an error or an unusable response
    #[error("Generation failure: {0}")]
    Generation(String),

    /// Vector index rejected an operation
    #[error("Index error: {0}")]
    Index(String),

    /// Ingestion, extraction and chunking errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure is transient and worth retrying by the caller.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Connectivity(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
