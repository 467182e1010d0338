//! Chat completion client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use boundly_core::config::ChatSettings;
use boundly_core::{Error, Result};
use boundly_embed::openai::{status_error, ApiEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
    /// Ask for a JSON object response.
    pub json: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { temperature: 0.2, top_p: 0.95, json: true }
    }
}

impl From<&ChatSettings> for CompletionOptions {
    fn from(s: &ChatSettings) -> Self {
        Self { temperature: s.temperature, top_p: s.top_p, json: true }
    }
}

/// A language model that completes a conversation with one message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions against OpenAI or an Azure OpenAI deployment.
pub struct OpenAiChat {
    client: Client,
    endpoint: ApiEndpoint,
    model: String,
}

impl OpenAiChat {
    pub fn new(settings: &ChatSettings) -> Result<Self> {
        if settings.model.trim().is_empty() {
            return Err(Error::InvalidConfig("chat.model must not be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: ApiEndpoint::new(&settings.api_base, &settings.api_key, &settings.api_version),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let url = self.endpoint.url(&self.model, "chat/completions");
        let body = ChatRequest {
            model: (!self.endpoint.is_azure()).then_some(self.model.as_str()),
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            response_format: options.json.then_some(ResponseFormat { kind: "json_object" }),
        };
        debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let resp = self
            .endpoint
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Operation(format!("chat request to {url} failed: {e}")))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Operation(format!("reading chat response: {e}")))?;
        if !status.is_success() {
            return Err(status_error(status, &text, Error::Operation));
        }
        first_choice(&text)
    }
}

fn first_choice(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::Operation(format!("unexpected chat response body: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Operation("chat response has no message content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let messages = [ChatMessage::new(Role::System, "s"), ChatMessage::new(Role::User, "u")];
        let req = ChatRequest {
            model: Some("gpt-4.1"),
            messages: &messages,
            temperature: 0.2,
            top_p: 0.95,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "u");
        assert_eq!(v["response_format"]["type"], "json_object");

        let azure = ChatRequest { model: None, response_format: None, ..req };
        let v = serde_json::to_value(&azure).unwrap();
        assert!(v.get("model").is_none());
        assert!(v.get("response_format").is_none());
    }

    #[test]
    fn content_of_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"decision\":\"yes\"}"}}]}"#;
        assert_eq!(first_choice(body).unwrap(), r#"{"decision":"yes"}"#);
        assert!(first_choice(r#"{"choices":[]}"#).is_err());
        assert!(first_choice("<html>").is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        let settings = ChatSettings { model: " ".into(), ..ChatSettings::default() };
        assert!(matches!(OpenAiChat::new(&settings), Err(Error::InvalidConfig(_))));
    }
}
