//! Completion endpoint client: `POST /api/chat`.
//!
//! Request body: `{ prompt, messages: [{role, content}] }`.
//! Response body: `{ choices: [ { message: { content } } ] }`; only the top
//! choice is used.

use serde::{Deserialize, Serialize};

use crate::config::HttpTimeouts;
use crate::message::ContextMessage;

pub const CHAT_PATH: &str = "/api/chat";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The HTTP request could not be sent or its body not read.
    #[error("completion request failed: {0}")]
    ApiRequest(String),

    #[error("completion response error: status {status}")]
    ApiResponse { status: u16, body: String },

    #[error("completion response parse failed: {0}")]
    ApiParse(String),

    /// The response decoded but carried no `choices[0]`.
    #[error("completion response has no choices")]
    MissingChoice,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub messages: Vec<ContextMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

impl ChatCompletion {
    /// Single-choice completion carrying an assistant reply.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ChoiceMessage { role: Some("assistant".to_string()), content: content.into() },
            }],
        }
    }

    /// Content of `choices[0].message`.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::MissingChoice`] when `choices` is empty.
    pub fn top_content(&self) -> Result<&str, CompletionError> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(CompletionError::MissingChoice)
    }
}

// =============================================================================
// CLIENT TRAIT
// =============================================================================

/// Remote completion capability. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send `request` and return the decoded completion.
    ///
    /// # Errors
    ///
    /// Returns a [`CompletionError`] on transport failure, non-2xx status, or
    /// an undecodable body.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, CompletionError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
}

impl HttpCompletionClient {
    /// Build a client for `{base_url}/api/chat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| CompletionError::HttpClientBuild(e.to_string()))?;
        let url = format!("{}{CHAT_PATH}", base_url.trim_end_matches('/'));
        Ok(Self { http, url })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl CompletionApi for HttpCompletionClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, CompletionError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::ApiRequest(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::ApiRequest(e.to_string()))?;
        if !status.is_success() {
            return Err(CompletionError::ApiResponse { status: status.as_u16(), body: text });
        }
        parse_completion(&text)
    }
}

pub(crate) fn parse_completion(text: &str) -> Result<ChatCompletion, CompletionError> {
    serde_json::from_str(text).map_err(|e| CompletionError::ApiParse(e.to_string()))
}

#[cfg(test)]
#[path = "completion_test.rs"]
mod tests;
