//! boundly-ingest
//!
//! Builds the corpus: discover source files, extract page text, split into
//! chunks, embed in throttled batches and bulk-write into the document index.
pub mod discover;
pub mod extract;
pub mod pipeline;

pub use discover::discover;
pub use pipeline::{IngestPipeline, IngestReport};
