//! Question answering over the document index.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use boundly_core::config::Settings;
use boundly_core::error::RetrievalError;
use boundly_core::retry::RetryPolicy;
use boundly_core::types::RetrievedResult;
use boundly_embed::build_embedder;
use boundly_hybrid::{HybridRetriever, LocalDocumentIndex};

use crate::llm::{ChatModel, CompletionOptions, OpenAiChat};
use crate::prompt::build_messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Yes,
    No,
    Unknown,
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "unknown" => Ok(Self::Unknown),
            other => Err(serde::de::Error::custom(format!("decision must be yes, no or unknown, got {other:?}"))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        })
    }
}

/// The model's answer, validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub decision: Decision,
    pub explanation: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: StructuredAnswer,
    /// Sources of the retrieved chunks, in rank order.
    pub citations: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[source] boundly_core::Error),
    #[error("model output is not a valid answer: {reason}")]
    MalformedModelOutput { reason: String, raw: String },
}

impl AnswerError {
    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retrieval(_) => "retrieval_error",
            Self::ModelInvocation(_) => "model_invocation_error",
            Self::MalformedModelOutput { .. } => "malformed_model_output",
        }
    }
}

pub struct AnsweringService {
    retriever: HybridRetriever,
    chat: Arc<dyn ChatModel>,
    k_dense: usize,
    k_sparse: usize,
    options: CompletionOptions,
}

impl AnsweringService {
    pub fn new(
        retriever: HybridRetriever,
        chat: Arc<dyn ChatModel>,
        k_dense: usize,
        k_sparse: usize,
        options: CompletionOptions,
    ) -> Self {
        Self { retriever, chat, k_dense, k_sparse, options }
    }

    /// Wire embedder, document index, retriever and chat client from settings.
    /// Relative index paths resolve against `base`.
    pub async fn from_settings(settings: &Settings, base: &Path) -> boundly_core::Result<Self> {
        let embedder = build_embedder(&settings.embedding)?;
        let index = LocalDocumentIndex::open(settings, base, embedder.embedder_id(), embedder.dim()).await?;
        let retriever = HybridRetriever::new(embedder, Arc::new(index))
            .with_oversample(settings.retrieval.oversample)
            .with_embed_policy(RetryPolicy::from(&settings.retrieval.embed_retry));
        let chat = Arc::new(OpenAiChat::new(&settings.chat)?);
        info!(model = %settings.chat.model, k_dense = settings.retrieval.k_dense, k_sparse = settings.retrieval.k_sparse, "answering service ready");
        Ok(Self::new(
            retriever,
            chat,
            settings.retrieval.k_dense,
            settings.retrieval.k_sparse,
            CompletionOptions::from(&settings.chat),
        ))
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub async fn answer(&self, question: &str) -> Result<QueryResponse, AnswerError> {
        let chunks = self.retriever.search(question, self.k_dense, self.k_sparse).await?;
        let messages = build_messages(question, &chunks);
        let raw = self.chat.complete(&messages, &self.options).await.map_err(AnswerError::ModelInvocation)?;
        let answer = parse_answer(&raw)?;
        let citations = cited_sources(&chunks);
        debug!(decision = %answer.decision, chunks = chunks.len(), citations = citations.len(), "answered");
        Ok(QueryResponse { answer, citations })
    }
}

/// Validate the model's JSON against the answer schema.
pub fn parse_answer(raw: &str) -> Result<StructuredAnswer, AnswerError> {
    serde_json::from_str(raw.trim())
        .map_err(|e| AnswerError::MalformedModelOutput { reason: e.to_string(), raw: raw.to_string() })
}

/// Distinct chunk sources, first occurrence wins.
fn cited_sources(chunks: &[RetrievedResult]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks.iter().filter(|c| seen.insert(c.source.as_str())).map(|c| c.source.clone()).collect()
}
