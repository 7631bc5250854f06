//! Error types for the fathom search engine.
//!
//! All fallible operations in the crate return [`Result`], built on a single
//! [`FathomError`] enum. The variants follow the failure taxonomy of the
//! engine: schema/configuration mistakes surface immediately and are never
//! retried, query errors surface per query, I/O errors during flush or merge
//! surface to the committing caller, and stale-handle misuse is reported as
//! its own kind rather than silently tolerated.

use thiserror::Error;

/// Result type alias for fathom operations.
pub type Result<T> = std::result::Result<T, FathomError>;

/// Error type for all fathom operations.
#[derive(Error, Debug)]
pub enum FathomError {
    /// Schema errors (invalid field definitions, type mismatches at ingest,
    /// incompatible on-disk schema).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration errors (ordering by a non-fast field, unregistered
    /// analyzer names, invalid tokenizer parameters).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query errors (unknown field reference, unsupported range type,
    /// malformed query-string syntax).
    #[error("Query error: {0}")]
    Query(String),

    /// Index errors (writer misuse, commit failures, merge bookkeeping).
    #[error("Index error: {0}")]
    Index(String),

    /// Text analysis errors.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// I/O errors from the storage layer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupted on-disk data (bad magic, checksum mismatch, truncation).
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// The writer hit an unrecoverable failure and must be recreated.
    #[error("Writer poisoned: {0}")]
    Poisoned(String),

    /// A handle (doc address, consumed writer) was used past its lifetime.
    #[error("Stale handle: {0}")]
    Stale(String),

    /// Other errors.
    #[error("Error: {0}")]
    Other(String),
}

impl FathomError {
    /// Create a schema error.
    pub fn schema<S: Into<String>>(message: S) -> Self {
        FathomError::Schema(message.into())
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        FathomError::Config(message.into())
    }

    /// Create a query error.
    pub fn query<S: Into<String>>(message: S) -> Self {
        FathomError::Query(message.into())
    }

    /// Create an index error.
    pub fn index<S: Into<String>>(message: S) -> Self {
        FathomError::Index(message.into())
    }

    /// Create an analysis error.
    pub fn analysis<S: Into<String>>(message: S) -> Self {
        FathomError::Analysis(message.into())
    }

    /// Create a corrupted-data error.
    pub fn corrupted<S: Into<String>>(message: S) -> Self {
        FathomError::Corrupted(message.into())
    }

    /// Create a poisoned-writer error.
    pub fn poisoned<S: Into<String>>(message: S) -> Self {
        FathomError::Poisoned(message.into())
    }

    /// Create a stale-handle error.
    pub fn stale<S: Into<String>>(message: S) -> Self {
        FathomError::Stale(message.into())
    }

    /// Create an other error.
    pub fn other<S: Into<String>>(message: S) -> Self {
        FathomError::Other(message.into())
    }
}

impl From<serde_json::Error> for FathomError {
    fn from(err: serde_json::Error) -> Self {
        FathomError::Corrupted(format!("JSON serialization failed: {err}"))
    }
}

impl From<fst::Error> for FathomError {
    fn from(err: fst::Error) -> Self {
        FathomError::Corrupted(format!("Term dictionary error: {err}"))
    }
}
