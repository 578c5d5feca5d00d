//! `POST /api/chat`: one completion round trip against the upstream LLM.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::{info, warn};

use crate::completion::{ChatCompletion, ChatRequest};
use crate::llm::types::{LlmError, Message};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ChatRouteError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("LLM is not configured")]
    NotConfigured,

    #[error("upstream returned no text")]
    EmptyCompletion,

    #[error(transparent)]
    Upstream(#[from] LlmError),
}

impl ChatRouteError {
    fn status(&self) -> StatusCode {
        match self {
            Self::EmptyPrompt => StatusCode::BAD_REQUEST,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::EmptyCompletion | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ChatRouteError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// `POST /api/chat`: answer `prompt` given the trailing context messages.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatCompletion>, ChatRouteError> {
    if body.prompt.trim().is_empty() {
        return Err(ChatRouteError::EmptyPrompt);
    }
    let Some(llm) = state.llm.as_ref() else {
        return Err(ChatRouteError::NotConfigured);
    };

    let messages = upstream_messages(&body, state.settings.context_messages);
    info!(context = messages.len() - 1, "chat: forwarding prompt upstream");

    let response = llm
        .chat(state.settings.max_tokens, &state.settings.system_prompt, &messages)
        .await
        .inspect_err(|e| warn!(error = %e, retryable = e.retryable(), "chat: upstream call failed"))?;
    if response.text.is_empty() {
        warn!(model = %response.model, stop_reason = %response.stop_reason, "chat: upstream returned no text");
        return Err(ChatRouteError::EmptyCompletion);
    }

    info!(
        model = %response.model,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "chat: completion ready"
    );
    Ok(Json(ChatCompletion::assistant(response.text)))
}

/// The last `limit` context entries followed by the prompt as a user turn.
pub(crate) fn upstream_messages(body: &ChatRequest, limit: usize) -> Vec<Message> {
    let skip = body.messages.len().saturating_sub(limit);
    body.messages[skip..]
        .iter()
        .map(|m| Message::new(m.role.as_str(), m.content.clone()))
        .chain(std::iter::once(Message::new("user", body.prompt.clone())))
        .collect()
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
