//! Domain types shared by the text engine, the vector engine and the retriever.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A span of source-document text before it has been embedded.
///
/// - `source`: basename of the originating document (e.g. `Case001.pdf`)
/// - `page`: 1-based page the span was cut from
/// - `chunk_index`: position of the chunk within its source
/// - `content`: the text payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
    pub content: String,
}

/// A chunk paired with its dense vector, ready to be written to the index.
///
/// The index assigns the `doc_id` at write time; callers never choose it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// Indicates which engine produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The surface returned by both halves of the document index.
///
/// `id` is the index-assigned chunk id. `score` is engine-specific (cosine
/// similarity for vectors, BM25 for text) but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub origin: SourceKind,
    pub content: String,
    pub source: String,
}

/// One entry of a fused, ranked retrieval result. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedResult {
    pub doc_id: ChunkId,
    pub content: String,
    pub source: String,
    pub score: f32,
}

/// An item the index refused or failed to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub source: String,
    pub chunk_index: usize,
    pub reason: String,
}

/// Outcome of a bulk write: how many chunks landed and which did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub indexed: usize,
    pub failed: Vec<FailedItem>,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.indexed += other.indexed;
        self.failed.extend(other.failed);
    }

    /// Mark every chunk in `chunks` as failed with the same reason.
    pub fn fail_all<'a>(chunks: impl IntoIterator<Item = &'a DocumentChunk>, reason: &str) -> Self {
        Self {
            indexed: 0,
            failed: chunks
                .into_iter()
                .map(|c| FailedItem { source: c.source.clone(), chunk_index: c.chunk_index, reason: reason.to_string() })
                .collect(),
        }
    }
}
