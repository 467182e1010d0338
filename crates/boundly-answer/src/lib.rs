//! boundly-answer
//!
//! Turns a question into a grounded, structured answer: hybrid retrieval,
//! prompt assembly, one structured chat completion, and the HTTP surface
//! that exposes it.
pub mod eval;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod service;

pub use llm::{ChatMessage, ChatModel, CompletionOptions, OpenAiChat, Role};
pub use prompt::build_messages;
pub use server::router;
pub use service::{AnswerError, AnsweringService, Decision, QueryResponse, StructuredAnswer};
