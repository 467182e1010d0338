use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index query failed: {0}")]
    IndexQuery(String),

    #[error("Index write failed: {0}")]
    IndexWrite(String),

    #[error("Text extraction failed for '{path}': {message}")]
    Extraction { path: String, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{op} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn index_query(message: impl Into<String>) -> Self {
        Self::IndexQuery(message.into())
    }

    pub fn index_write(message: impl Into<String>) -> Self {
        Self::IndexWrite(message.into())
    }

    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction { path: path.into(), message: message.into() }
    }

    /// Configuration and schema problems never heal on their own.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which part of a retrieval call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    Embed,
    Dense,
    Sparse,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Embed => "query embedding",
            Self::Dense => "dense search",
            Self::Sparse => "sparse search",
        };
        f.write_str(s)
    }
}

/// A retrieval call failed; the request fails with it. No partial results.
#[derive(Debug, Error)]
#[error("retrieval failed during {stage} for query {query:?}: {source}")]
pub struct RetrievalError {
    pub stage: RetrievalStage,
    pub query: String,
    #[source]
    pub source: Error,
}

/// One embedding batch exhausted its retries during ingestion. The batch is
/// dropped and the pipeline moves on.
#[derive(Debug, Error)]
#[error("embedding batch {batch} (chunks {start}..{end}) failed after {attempts} attempt(s): {source}")]
pub struct IngestionBatchError {
    pub batch: usize,
    pub start: usize,
    pub end: usize,
    pub attempts: u32,
    #[source]
    pub source: Error,
}
