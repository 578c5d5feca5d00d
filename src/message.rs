//! Chat message model shared by the store, the view and the wire types.
//!
//! DESIGN
//! ======
//! Timestamps are kept raw (`Timestamp`, ms since epoch) on `ChatMessage` so
//! the view can sort by creation time; they are formatted only at render
//! time. A `None` timestamp means the store has not resolved its server time
//! yet and renders as `None` as well.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

// =============================================================================
// ROLE
// =============================================================================

/// Author of a chat message. Stored as free text, used as a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse stored role text. Unknown roles yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
            return Self(0);
        };
        Self(i64::try_from(dur.as_millis()).unwrap_or(0))
    }

    #[must_use]
    pub fn millis(self) -> i64 {
        self.0
    }
}

/// Display form of a store timestamp. Pending timestamps stay `None`.
#[must_use]
pub fn format_timestamp(ts: Option<Timestamp>) -> Option<String> {
    let ts = ts?;
    let nanos = i128::from(ts.0) * 1_000_000;
    let Ok(dt) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return Some(ts.0.to_string());
    };
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    Some(dt.format(&format).unwrap_or_else(|_| ts.0.to_string()))
}

// =============================================================================
// MESSAGES
// =============================================================================

/// A conversation turn as held by the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Store-assigned identifier; absent until persisted.
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    /// `None` while the store's server timestamp is pending.
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl ChatMessage {
    #[must_use]
    pub fn context(&self) -> ContextMessage {
        ContextMessage { role: self.role, content: self.content.clone() }
    }
}

/// `{role, content}` pair sent to the completion endpoint as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

/// Stable sort by creation time, non-decreasing. Pending timestamps sort
/// after every resolved one.
pub fn sort_by_creation(messages: &mut [ChatMessage]) {
    messages.sort_by_key(|m| (m.created_at.is_none(), m.created_at));
}

/// The trailing `n` messages as completion context.
#[must_use]
pub fn tail_context(messages: &[ChatMessage], n: usize) -> Vec<ContextMessage> {
    let start = messages.len().saturating_sub(n);
    messages[start..].iter().map(ChatMessage::context).collect()
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
