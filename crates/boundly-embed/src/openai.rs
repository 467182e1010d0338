//! OpenAI-compatible embeddings over HTTP.
//!
//! Two URL shapes are supported. With an `api_version` the endpoint is
//! treated as Azure OpenAI (`{base}/openai/deployments/{model}/{op}` plus an
//! `api-key` header); without one it is the plain OpenAI API
//! (`{base}/v1/{op}` plus bearer auth).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use boundly_core::config::EmbeddingSettings;
use boundly_core::traits::Embedder;
use boundly_core::{Error, Result};

/// Base URL, credentials and URL shape of an OpenAI-compatible service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base: String,
    api_key: String,
    api_version: Option<String>,
}

impl ApiEndpoint {
    pub fn new(base: &str, api_key: &str, api_version: &str) -> Self {
        let api_version = (!api_version.trim().is_empty()).then(|| api_version.trim().to_string());
        Self { base: base.trim_end_matches('/').to_string(), api_key: api_key.to_string(), api_version }
    }

    pub fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }

    /// Full URL for `operation` (e.g. `embeddings`, `chat/completions`) on `model`.
    pub fn url(&self, model: &str, operation: &str) -> String {
        match &self.api_version {
            Some(v) => format!("{}/openai/deployments/{model}/{operation}?api-version={v}", self.base),
            None if self.base.ends_with("/v1") => format!("{}/{operation}", self.base),
            None => format!("{}/v1/{operation}", self.base),
        }
    }

    pub fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            return req;
        }
        if self.is_azure() {
            req.header("api-key", &self.api_key)
        } else {
            req.bearer_auth(&self.api_key)
        }
    }
}

/// Map a non-success HTTP status to an error. Rejected credentials are a
/// configuration problem and are not retried.
pub fn status_error(status: StatusCode, body: &str, wrap: fn(String) -> Error) -> Error {
    let snippet: String = body.chars().take(300).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::InvalidConfig(format!("credentials rejected (HTTP {status}): {snippet}"))
        }
        _ => wrap(format!("HTTP {status}: {snippet}")),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: ApiEndpoint,
    model: String,
    dim: usize,
    embedder_id: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        if settings.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: ApiEndpoint::new(&settings.api_base, &settings.api_key, &settings.api_version),
            model: settings.model.clone(),
            dim: settings.dimension,
            embedder_id: format!("openai:{}:d{}", settings.model, settings.dimension),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint.url(&self.model, "embeddings");
        // Azure selects the model through the deployment path.
        let body = EmbeddingRequest { input: texts, model: (!self.endpoint.is_azure()).then_some(self.model.as_str()) };
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");

        let resp = self
            .endpoint
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request to {url} failed: {e}")))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::embedding(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(status_error(status, &text, Error::Embedding));
        }
        let parsed: EmbeddingResponse =
            serde_json::from_str(&text).map_err(|e| Error::embedding(format!("unexpected response body: {e}")))?;
        order_embeddings(parsed, texts.len(), self.dim)
    }
}

/// Restore input order and check count and dimensionality.
fn order_embeddings(resp: EmbeddingResponse, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = resp.data;
    if data.len() != expected {
        return Err(Error::embedding(format!("expected {expected} vectors, got {}", data.len())));
    }
    data.sort_by_key(|d| d.index);
    data.into_iter()
        .map(|d| {
            if d.embedding.len() == dim {
                Ok(d.embedding)
            } else {
                Err(Error::InvalidConfig(format!(
                    "embedding dimension {} does not match configured {dim}",
                    d.embedding.len()
                )))
            }
        })
        .collect()
}
