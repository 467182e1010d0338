//! Dense + sparse retrieval fused by score summation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use boundly_core::error::{RetrievalError, RetrievalStage};
use boundly_core::retry::RetryPolicy;
use boundly_core::traits::{DocumentIndex, Embedder};
use boundly_core::types::{RetrievedResult, SearchHit};
use boundly_core::Error;

pub const DEFAULT_OVERSAMPLE: usize = 4;

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn DocumentIndex>,
    oversample: usize,
    embed_policy: RetryPolicy,
}

impl HybridRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn DocumentIndex>) -> Self {
        Self { embedder, index, oversample: DEFAULT_OVERSAMPLE, embed_policy: RetryPolicy::default() }
    }

    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample.max(1);
        self
    }

    pub fn with_embed_policy(mut self, policy: RetryPolicy) -> Self {
        self.embed_policy = policy;
        self
    }

    /// Top `k_dense + k_sparse` chunks for `query`, best first, one entry per `doc_id`.
    ///
    /// The dense and sparse queries run concurrently; if either fails the
    /// whole call fails. A `k` of zero skips that side; a blank query
    /// retrieves nothing.
    pub async fn search(
        &self,
        query: &str,
        k_dense: usize,
        k_sparse: usize,
    ) -> Result<Vec<RetrievedResult>, RetrievalError> {
        if query.trim().is_empty() {
            debug!("blank query, nothing to retrieve");
            return Ok(Vec::new());
        }
        let fail = |stage, source| RetrievalError { stage, query: query.to_string(), source };

        let dense = async {
            if k_dense == 0 {
                return Ok(Vec::new());
            }
            let vector = self.embed_query(query).await.map_err(|e| fail(RetrievalStage::Embed, e))?;
            self.index
                .vector_search(&vector, k_dense, k_dense.saturating_mul(self.oversample))
                .await
                .map_err(|e| fail(RetrievalStage::Dense, e))
        };
        let sparse = async {
            if k_sparse == 0 {
                return Ok(Vec::new());
            }
            self.index.text_search(query, k_sparse).await.map_err(|e| fail(RetrievalStage::Sparse, e))
        };
        let (dense_hits, sparse_hits) = tokio::try_join!(dense, sparse)?;
        debug!(dense = dense_hits.len(), sparse = sparse_hits.len(), "retrieved");

        Ok(fuse(dense_hits, sparse_hits, k_dense + k_sparse))
    }

    async fn embed_query(&self, query: &str) -> boundly_core::Result<Vec<f32>> {
        let texts = [query.to_string()];
        let vectors = self.embed_policy.run("embed query", || self.embedder.embed_batch(&texts)).await?;
        vectors.into_iter().next().ok_or_else(|| Error::embedding("embedder returned no vector"))
    }
}

/// Sum each document's scores across both lists, sort by the sum and keep `limit`.
///
/// Native scores are added as-is, at most once per list: an id repeated
/// within one list keeps its first (best) score. Ties keep first-sighting
/// order: dense hits in rank order, then sparse hits not already seen. A NaN
/// score ranks below every real score.
pub fn fuse(dense: Vec<SearchHit>, sparse: Vec<SearchHit>, limit: usize) -> Vec<RetrievedResult> {
    let mut fused: Vec<RetrievedResult> = Vec::with_capacity(dense.len() + sparse.len());
    let mut slot: HashMap<String, usize> = HashMap::new();
    for list in [dense, sparse] {
        let mut seen: HashSet<String> = HashSet::with_capacity(list.len());
        for hit in list {
            if !seen.insert(hit.id.clone()) {
                continue;
            }
            let i = *slot.entry(hit.id.clone()).or_insert_with(|| {
                fused.push(RetrievedResult { doc_id: hit.id.clone(), content: hit.content.clone(), source: hit.source.clone(), score: 0.0 });
                fused.len() - 1
            });
            fused[i].score += hit.score;
        }
    }
    // Stable: equal scores stay in first-sighting order.
    fused.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
    fused.truncate(limit);
    fused
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}
