use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EmbeddedChunk, SearchHit, WriteReport};

/// Turns text into fixed-length dense vectors.
///
/// One vector per input, in input order. All vectors produced under one
/// `embedder_id` share the same dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model and version (e.g. `openai:text-embedding-ada-002:d1536`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Read side of the document index: two query modes over one collection.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Approximate nearest neighbours by cosine similarity. `candidate_pool`
    /// is the number of candidates considered before the top `k` are kept.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        k: usize,
        candidate_pool: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Lexical BM25 ranking over chunk content.
    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Write side of the document index. Append-only.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn bulk_write(&self, items: Vec<EmbeddedChunk>) -> Result<WriteReport>;
}
