//! In-process realtime message store.
//!
//! DESIGN
//! ======
//! Documents and live listeners share one `Mutex`. Every write rebuilds the
//! affected user's result set and pushes it to that user's listeners, so a
//! snapshot is always a full replace.
//!
//! With latency compensation on (the default), a write is echoed twice:
//! first with `ServerTime` fields still pending (`None`), then again once the
//! store has stamped them. That mirrors hosted document stores, where the
//! local echo arrives before the server acknowledgement.
//!
//! Listeners whose `Subscription` has been dropped are pruned on the next
//! notify.

use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use super::{
    MessagePatch, MessageQuery, MessageStore, NewMessage, Snapshot, SnapshotSender, StoreError, StoredMessage,
    Subscription, WriteTimestamp,
};
use crate::message::Timestamp;

struct Listener {
    query: MessageQuery,
    tx: SnapshotSender,
}

#[derive(Default)]
struct Inner {
    docs: Vec<StoredMessage>,
    listeners: Vec<Listener>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency_compensation: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()), latency_compensation: true }
    }

    /// Store that stamps server timestamps before the first echo.
    #[must_use]
    pub fn without_latency_compensation() -> Self {
        Self { inner: Mutex::new(Inner::default()), latency_compensation: false }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// All documents, in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<StoredMessage> {
        self.lock().docs.clone()
    }

    /// Number of live listeners after pruning dropped subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|l| !l.tx.is_closed());
        inner.listeners.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn snapshot_for(&self, user_id: &str) -> Snapshot {
        let mut docs: Vec<StoredMessage> = self
            .docs
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by_key(|d| (d.created_at.is_none(), d.created_at));
        Snapshot { docs }
    }

    fn notify(&mut self, user_id: &str) {
        self.listeners.retain(|l| !l.tx.is_closed());
        let snapshot = self.snapshot_for(user_id);
        for listener in self.listeners.iter().filter(|l| l.query.user_id == user_id) {
            // A receiver dropped since the retain above is pruned next time.
            let _ = listener.tx.send(snapshot.clone());
        }
    }
}

fn committed(ts: WriteTimestamp, now: Timestamp) -> Timestamp {
    match ts {
        WriteTimestamp::ServerTime => now,
        WriteTimestamp::At(ts) => ts,
    }
}

fn local_echo(ts: WriteTimestamp) -> Option<Timestamp> {
    match ts {
        WriteTimestamp::ServerTime => None,
        WriteTimestamp::At(ts) => Some(ts),
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStore {
    async fn subscribe(&self, query: &MessageQuery) -> Result<Subscription, StoreError> {
        let (tx, subscription) = Subscription::channel();
        let mut inner = self.lock();
        let _ = tx.send(inner.snapshot_for(&query.user_id));
        inner.listeners.push(Listener { query: query.clone(), tx });
        debug!(user_id = %query.user_id, listeners = inner.listeners.len(), "memory store: subscribed");
        Ok(subscription)
    }

    async fn add(&self, message: NewMessage) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();

        let pending = self.latency_compensation
            && (message.created_at == WriteTimestamp::ServerTime || message.updated_at == WriteTimestamp::ServerTime);
        if pending {
            inner.docs.push(StoredMessage {
                id: id.clone(),
                user_id: message.user_id.clone(),
                role: message.role.as_str().to_owned(),
                content: message.content.clone(),
                created_at: local_echo(message.created_at),
                updated_at: local_echo(message.updated_at),
            });
            inner.notify(&message.user_id);
            inner.docs.retain(|d| d.id != id);
        }

        let now = Timestamp::now();
        inner.docs.push(StoredMessage {
            id: id.clone(),
            user_id: message.user_id.clone(),
            role: message.role.as_str().to_owned(),
            content: message.content,
            created_at: Some(committed(message.created_at, now)),
            updated_at: Some(committed(message.updated_at, now)),
        });
        inner.notify(&message.user_id);
        debug!(%id, user_id = %message.user_id, role = %message.role, "memory store: added");
        Ok(id)
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let Some(index) = inner.docs.iter().position(|d| d.id == id) else {
            return Err(StoreError::NotFound(id.to_owned()));
        };
        let user_id = inner.docs[index].user_id.clone();
        inner.docs[index].content = patch.content;

        if self.latency_compensation && patch.updated_at == WriteTimestamp::ServerTime {
            inner.docs[index].updated_at = None;
            inner.notify(&user_id);
        }
        inner.docs[index].updated_at = Some(committed(patch.updated_at, Timestamp::now()));
        inner.notify(&user_id);
        debug!(%id, %user_id, "memory store: updated");
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
