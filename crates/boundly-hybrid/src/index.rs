use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use boundly_core::config::Settings;
use boundly_core::retry::RetryPolicy;
use boundly_core::traits::{DocumentIndex, IndexWriter};
use boundly_core::types::{ChunkId, DocumentChunk, EmbeddedChunk, FailedItem, SearchHit, WriteReport};
use boundly_core::{Error, Result};
use boundly_text::TantivyIndex;
use boundly_vector::LanceStore;

pub const DEFAULT_WRITE_BATCH: usize = 500;

/// One logical chunk collection stored in both a tantivy and a lance index
/// under shared ids.
#[derive(Clone)]
pub struct LocalDocumentIndex {
    text: TantivyIndex,
    vector: LanceStore,
    query_policy: RetryPolicy,
    write_policy: RetryPolicy,
    write_batch_size: usize,
}

impl LocalDocumentIndex {
    pub fn new(text: TantivyIndex, vector: LanceStore) -> Self {
        Self {
            text,
            vector,
            query_policy: RetryPolicy::default(),
            write_policy: RetryPolicy::default(),
            write_batch_size: DEFAULT_WRITE_BATCH,
        }
    }

    /// Open both halves under `index.root` resolved against `base`.
    pub async fn open(settings: &Settings, base: &Path, embedder_id: &str, dim: usize) -> Result<Self> {
        let text_dir = settings.index.text_dir(base);
        let text = tokio::task::spawn_blocking(move || TantivyIndex::open_or_create(&text_dir))
            .await
            .map_err(|e| Error::Operation(format!("text index open task: {e}")))??;
        let vector = LanceStore::open(&settings.index.vector_dir(base), &settings.index.table, embedder_id, dim).await?;
        info!(table = %settings.index.table, "document index ready");
        Ok(Self::new(text, vector)
            .with_query_policy(RetryPolicy::from(&settings.index.retry))
            .with_write_policy(RetryPolicy::from(&settings.ingest.write_retry), settings.ingest.write_batch_size))
    }

    pub fn with_query_policy(mut self, policy: RetryPolicy) -> Self {
        self.query_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: RetryPolicy, batch_size: usize) -> Self {
        self.write_policy = policy;
        self.write_batch_size = batch_size.max(1);
        self
    }

    pub fn text(&self) -> &TantivyIndex {
        &self.text
    }

    pub fn vector(&self) -> &LanceStore {
        &self.vector
    }

    fn validate(&self, item: &EmbeddedChunk) -> std::result::Result<(), String> {
        if item.vector.len() != self.vector.dim() {
            return Err(format!("vector has {} dims, index expects {}", item.vector.len(), self.vector.dim()));
        }
        if item.chunk.content.trim().is_empty() {
            return Err("empty content".to_string());
        }
        Ok(())
    }

    /// Vectors first, then text. A text failure removes the batch's vectors
    /// again so a failed item is never searchable.
    async fn write_batch(&self, batch: &[(ChunkId, EmbeddedChunk)]) -> Result<usize> {
        let rows: Vec<(ChunkId, &EmbeddedChunk)> = batch.iter().map(|(id, e)| (id.clone(), e)).collect();
        let ids: Vec<ChunkId> = batch.iter().map(|(id, _)| id.clone()).collect();
        let (rows, ids) = (&rows, &ids);
        let mut first_attempt = true;
        self.write_policy
            .run("vector bulk write", || {
                let retry = !std::mem::replace(&mut first_attempt, false);
                async move {
                    // A timed-out attempt may still have landed.
                    if retry {
                        self.vector.delete_ids(ids).await?;
                    }
                    self.vector.add(rows).await
                }
            })
            .await?;

        let docs: Arc<Vec<(ChunkId, DocumentChunk)>> =
            Arc::new(batch.iter().map(|(id, e)| (id.clone(), e.chunk.clone())).collect());
        let text_result = self
            .write_policy
            .run("text bulk write", || {
                let text = self.text.clone();
                let docs = Arc::clone(&docs);
                async move {
                    tokio::task::spawn_blocking(move || text.add(&docs))
                        .await
                        .map_err(|e| Error::index_write(format!("text write task: {e}")))?
                }
            })
            .await;
        match text_result {
            Ok(n) => Ok(n),
            Err(text_err) => match self.vector.delete_ids(ids).await {
                Ok(()) => Err(text_err),
                Err(rollback) => {
                    error!(count = ids.len(), error = %rollback, "vectors of a failed batch could not be removed");
                    Err(Error::index_write(format!("{text_err}; vectors left in dense index: {rollback}")))
                }
            },
        }
    }
}

#[async_trait]
impl DocumentIndex for LocalDocumentIndex {
    async fn vector_search(&self, query_vec: &[f32], k: usize, candidate_pool: usize) -> Result<Vec<SearchHit>> {
        self.query_policy.run("vector search", || self.vector.search(query_vec, k, candidate_pool)).await
    }

    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.query_policy
            .run("text search", || {
                let text = self.text.clone();
                let query = query.to_string();
                async move {
                    tokio::task::spawn_blocking(move || text.search(&query, limit))
                        .await
                        .map_err(|e| Error::index_query(format!("text search task: {e}")))?
                }
            })
            .await
    }
}

#[async_trait]
impl IndexWriter for LocalDocumentIndex {
    /// Validate, assign ids and append in write batches. Failures are
    /// reported per item; the remaining batches are still written.
    async fn bulk_write(&self, items: Vec<EmbeddedChunk>) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        let mut accepted: Vec<(ChunkId, EmbeddedChunk)> = Vec::with_capacity(items.len());
        for item in items {
            match self.validate(&item) {
                Ok(()) => accepted.push((Uuid::new_v4().to_string(), item)),
                Err(reason) => {
                    error!(source = %item.chunk.source, chunk_index = item.chunk.chunk_index, %reason, "rejected chunk");
                    report.failed.push(FailedItem { source: item.chunk.source, chunk_index: item.chunk.chunk_index, reason });
                }
            }
        }

        for batch in accepted.chunks(self.write_batch_size) {
            match self.write_batch(batch).await {
                Ok(n) => {
                    report.indexed += n;
                    debug!(count = n, "write batch committed");
                }
                Err(e) => {
                    error!(count = batch.len(), error = %e, "write batch failed");
                    report.merge(WriteReport::fail_all(batch.iter().map(|(_, item)| &item.chunk), &e.to_string()));
                }
            }
        }
        info!(indexed = report.indexed, failed = report.failed.len(), "bulk write finished");
        Ok(report)
    }
}
