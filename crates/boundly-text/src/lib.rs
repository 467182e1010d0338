//! boundly-text
//!
//! Tantivy-backed sparse half of the document index: BM25 over chunk content
//! with stored `id` and `source` fields. Writes are append-only.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::TantivyIndex;
