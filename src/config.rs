//! Chat client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_CHAT_API_BASE_URL: &str = "http://127.0.0.1:3000";
/// Hard cap on context entries per turn; larger settings are clamped.
pub const MAX_CHAT_CONTEXT_MESSAGES: usize = 5;
pub const DEFAULT_CHAT_CONTEXT_MESSAGES: usize = MAX_CHAT_CONTEXT_MESSAGES;
pub const DEFAULT_CHAT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CHAT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_CHAT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CHAT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Origin serving `POST /api/chat`, without trailing slash.
    pub api_base_url: String,
    /// How many trailing messages are sent as completion context.
    pub context_messages: usize,
    pub timeouts: HttpTimeouts,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_CHAT_API_BASE_URL.to_string(),
            context_messages: DEFAULT_CHAT_CONTEXT_MESSAGES,
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl ChatConfig {
    /// Build typed chat config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_API_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `CHAT_CONTEXT_MESSAGES`: default 5, clamped to at most 5
    /// - `CHAT_REQUEST_TIMEOUT_SECS`: default 120
    /// - `CHAT_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("CHAT_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_CHAT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            api_base_url,
            context_messages: env_parse("CHAT_CONTEXT_MESSAGES", DEFAULT_CHAT_CONTEXT_MESSAGES)
                .min(MAX_CHAT_CONTEXT_MESSAGES),
            timeouts: HttpTimeouts {
                request_secs: env_parse("CHAT_REQUEST_TIMEOUT_SECS", DEFAULT_CHAT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CHAT_CONNECT_TIMEOUT_SECS),
            },
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when unset
/// or unparsable.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
