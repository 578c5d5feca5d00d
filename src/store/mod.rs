//! Message store collaborator: live queries and writes over `messages`.
//!
//! ARCHITECTURE
//! ============
//! The view talks to the store only through [`MessageStore`]. A live query
//! is a [`Subscription`]: a non-restartable stream of full [`Snapshot`]s,
//! first the current result set, then one per change, until it is
//! unsubscribed or dropped.
//!
//! Writes carry [`WriteTimestamp`] values. `ServerTime` is resolved by the
//! store at commit time; until then readers observe the field as `None`.

pub mod memory;
pub mod postgres;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::message::{Role, Timestamp};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// QUERY / WRITE TYPES
// =============================================================================

/// Live query over `messages`: `userId == user_id`, ordered by `createdAt`
/// ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub user_id: String,
}

impl MessageQuery {
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// Timestamp value used in writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTimestamp {
    /// Resolved by the store when the write commits.
    ServerTime,
    At(Timestamp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: WriteTimestamp,
    pub updated_at: WriteTimestamp,
}

impl NewMessage {
    /// A new record with both timestamps set to server time.
    #[must_use]
    pub fn server_timed(user_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            content: content.into(),
            created_at: WriteTimestamp::ServerTime,
            updated_at: WriteTimestamp::ServerTime,
        }
    }
}

/// Content rewrite of an existing record. Role and `created_at` are never
/// part of a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: String,
    pub updated_at: WriteTimestamp,
}

/// A persisted document as delivered in snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub user_id: String,
    /// Free text; see [`Role::parse`].
    pub role: String,
    pub content: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Full result set of a live query at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub docs: Vec<StoredMessage>,
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle to a live query. Dropping it unsubscribes.
pub struct Subscription {
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
}

/// Producer half held by the store for one subscription.
pub type SnapshotSender = mpsc::UnboundedSender<Snapshot>;

impl Subscription {
    #[must_use]
    pub fn channel() -> (SnapshotSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { snapshots: rx })
    }

    /// Stop receiving snapshots. The store notices on its next send.
    pub fn unsubscribe(mut self) {
        self.snapshots.close();
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.get_mut().snapshots.poll_recv(cx)
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Document-store capability used by the chat view. Enables fakes in tests.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Open a live query. The first snapshot is the current result set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query cannot be started.
    async fn subscribe(&self, query: &MessageQuery) -> Result<Subscription, StoreError>;

    /// Insert a record and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write fails.
    async fn add(&self, message: NewMessage) -> Result<String, StoreError>;

    /// Rewrite content and `updated_at` of an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or another
    /// [`StoreError`] if the write fails.
    async fn update(&self, id: &str, patch: MessagePatch) -> Result<(), StoreError>;
}
