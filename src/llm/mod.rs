//! LLM: upstream model adapter behind the companion `/api/chat` endpoint.
//!
//! DESIGN
//! ======
//! Configuration comes from environment variables. The route handler only
//! sees the [`LlmChat`] trait, so tests swap in a mock and the server can run
//! with no upstream configured (the endpoint then answers 503).

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
use openai::OpenAiClient;
pub use types::LlmChat;
use types::LlmError;

/// Build the upstream client from environment variables.
///
/// # Errors
///
/// Returns an error if the API key is missing or the HTTP client fails.
pub fn client_from_env() -> Result<OpenAiClient, LlmError> {
    OpenAiClient::new(LlmConfig::from_env()?)
}
