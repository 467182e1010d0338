//! Hybrid retrieval over the local document index.
//!
//! [`LocalDocumentIndex`] composes the tantivy and lance halves into one
//! collection with shared chunk ids; [`HybridRetriever`] queries both and fuses
//! the ranked lists.

pub mod index;
pub mod retriever;

pub use index::LocalDocumentIndex;
pub use retriever::{fuse, HybridRetriever};
