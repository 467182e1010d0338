//! boundly-core
//!
//! Domain types, the traits every engine implements, the error taxonomy, the
//! layered configuration loader, the retry policy shared by all outbound
//! calls, and the deterministic text splitter used during ingestion.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
