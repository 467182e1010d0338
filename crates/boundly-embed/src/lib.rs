//! Embedding providers behind the [`Embedder`] trait.

use std::sync::Arc;

use tracing::info;

use boundly_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use boundly_core::traits::Embedder;
use boundly_core::Result;

pub mod fake;
pub mod openai;

pub use fake::FakeEmbedder;
pub use openai::{ApiEndpoint, OpenAiEmbedder};

/// Build the embedder selected by `embedding.provider`.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::Openai => Arc::new(OpenAiEmbedder::new(settings)?),
        EmbeddingProviderKind::Fake => Arc::new(FakeEmbedder::new(settings.dimension)),
    };
    info!(embedder_id = embedder.embedder_id(), dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}
