//! Shared application state for the companion chat backend.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the optional upstream LLM client and the per-request settings
//! read once at startup.

use std::sync::Arc;

use crate::config::{DEFAULT_CHAT_CONTEXT_MESSAGES, MAX_CHAT_CONTEXT_MESSAGES, env_parse};
use crate::llm::LlmChat;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for site administrators. Answer concisely.";
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1024;

// =============================================================================
// CHAT SETTINGS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Upper bound on context entries forwarded upstream; older ones are dropped.
    pub context_messages: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            context_messages: DEFAULT_CHAT_CONTEXT_MESSAGES,
        }
    }
}

impl ChatSettings {
    /// Read `CHAT_SYSTEM_PROMPT`, `LLM_MAX_TOKENS` and `CHAT_CONTEXT_MESSAGES`.
    #[must_use]
    pub fn from_env() -> Self {
        let system_prompt = std::env::var("CHAT_SYSTEM_PROMPT")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self {
            system_prompt,
            max_tokens: env_parse("LLM_MAX_TOKENS", DEFAULT_LLM_MAX_TOKENS),
            context_messages: env_parse("CHAT_CONTEXT_MESSAGES", DEFAULT_CHAT_CONTEXT_MESSAGES)
                .min(MAX_CHAT_CONTEXT_MESSAGES),
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; inner fields are Arc-wrapped or cheap.
#[derive(Clone)]
pub struct AppState {
    /// Optional LLM client. `None` if LLM env vars are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
    pub settings: Arc<ChatSettings>,
}

impl AppState {
    #[must_use]
    pub fn new(llm: Option<Arc<dyn LlmChat>>, settings: ChatSettings) -> Self {
        Self { llm, settings: Arc::new(settings) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ENV_LOCK;

    #[test]
    fn settings_from_env_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            std::env::remove_var("CHAT_SYSTEM_PROMPT");
            std::env::remove_var("LLM_MAX_TOKENS");
            std::env::remove_var("CHAT_CONTEXT_MESSAGES");
        }
        assert_eq!(ChatSettings::from_env(), ChatSettings::default());
    }

    #[test]
    fn settings_from_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            std::env::set_var("CHAT_SYSTEM_PROMPT", "be terse");
            std::env::set_var("LLM_MAX_TOKENS", "256");
            std::env::set_var("CHAT_CONTEXT_MESSAGES", "3");
        }
        let settings = ChatSettings::from_env();
        unsafe {
            std::env::remove_var("CHAT_SYSTEM_PROMPT");
            std::env::remove_var("LLM_MAX_TOKENS");
            std::env::remove_var("CHAT_CONTEXT_MESSAGES");
        }
        assert_eq!(settings, ChatSettings { system_prompt: "be terse".into(), max_tokens: 256, context_messages: 3 });
    }

    #[test]
    fn settings_context_is_capped() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { std::env::set_var("CHAT_CONTEXT_MESSAGES", "50") };
        let settings = ChatSettings::from_env();
        unsafe { std::env::remove_var("CHAT_CONTEXT_MESSAGES") };
        assert_eq!(settings.context_messages, MAX_CHAT_CONTEXT_MESSAGES);
    }

    #[test]
    fn blank_system_prompt_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { std::env::set_var("CHAT_SYSTEM_PROMPT", "   ") };
        let settings = ChatSettings::from_env();
        unsafe { std::env::remove_var("CHAT_SYSTEM_PROMPT") };
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }
}
