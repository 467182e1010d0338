//! Shared startup for the BoundLy binaries.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use boundly_core::config::{Config, Settings};
use boundly_core::traits::Embedder;
use boundly_embed::build_embedder;
use boundly_hybrid::LocalDocumentIndex;

pub const DEFAULT_LOG_FILTER: &str = "boundly=info,tower_http=info";

/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Layered configuration plus the directory relative paths resolve against.
pub fn load_settings() -> anyhow::Result<(Settings, PathBuf)> {
    let settings = Config::load()?.settings()?;
    let base = std::env::current_dir().context("resolving working directory")?;
    Ok((settings, base))
}

pub async fn open_index(settings: &Settings, base: &std::path::Path) -> anyhow::Result<(Arc<dyn Embedder>, LocalDocumentIndex)> {
    let embedder = build_embedder(&settings.embedding)?;
    let index = LocalDocumentIndex::open(settings, base, embedder.embedder_id(), embedder.dim())
        .await
        .with_context(|| format!("opening index under {}", settings.index.root))?;
    Ok((embedder, index))
}
