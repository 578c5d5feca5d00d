//! Fakes for the chat view's collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::time::{Duration, timeout};

use crate::auth::AuthProvider;
use crate::completion::{ChatCompletion, ChatRequest, CompletionApi, CompletionError};
use crate::config::ChatConfig;
use crate::store::memory::MemoryStore;
use crate::store::{
    MessagePatch, MessageQuery, MessageStore, NewMessage, Snapshot, SnapshotSender, StoreError, StoredMessage,
    Subscription,
};
use crate::view::{ChatView, ViewState};

/// Serializes tests that mutate process environment variables.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

// =========================================================================
// MockCompletions
// =========================================================================

/// Replays queued results; answers `"done"` once the queue is empty.
/// Optionally parks every call until the gate is notified.
#[derive(Default)]
pub struct MockCompletions {
    responses: Mutex<Vec<Result<ChatCompletion, CompletionError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    gate: Option<Arc<Notify>>,
}

impl MockCompletions {
    pub fn new(responses: Vec<Result<ChatCompletion, CompletionError>>) -> Self {
        Self { responses: Mutex::new(responses), ..Self::default() }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionApi for MockCompletions {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() { Ok(ChatCompletion::assistant("done")) } else { responses.remove(0) }
    }
}

// =========================================================================
// FlakyStore
// =========================================================================

/// `MemoryStore` with switchable write failures and a write counter.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_add: AtomicBool,
    pub fail_update: AtomicBool,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageStore for FlakyStore {
    async fn subscribe(&self, query: &MessageQuery) -> Result<Subscription, StoreError> {
        self.inner.subscribe(query).await
    }

    async fn add(&self, message: NewMessage) -> Result<String, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("add disabled".into()));
        }
        self.inner.add(message).await
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update disabled".into()));
        }
        self.inner.update(id, patch).await
    }
}

// =========================================================================
// ManualStore
// =========================================================================

/// Store whose snapshots are pushed by the test. Writes are rejected.
#[derive(Default)]
pub struct ManualStore {
    subscriptions: Mutex<Vec<(MessageQuery, SnapshotSender)>>,
}

impl ManualStore {
    /// Queries opened so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.user_id.clone())
            .collect()
    }

    /// Queries whose subscription is still held by a reader.
    pub fn open_queries(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(q, _)| q.user_id.clone())
            .collect()
    }

    /// Push `docs` to every open subscription for `user_id`.
    pub fn push(&self, user_id: &str, docs: Vec<StoredMessage>) {
        for (query, tx) in self.subscriptions.lock().unwrap().iter() {
            if query.user_id == user_id {
                let _ = tx.send(Snapshot { docs: docs.clone() });
            }
        }
    }
}

#[async_trait::async_trait]
impl MessageStore for ManualStore {
    async fn subscribe(&self, query: &MessageQuery) -> Result<Subscription, StoreError> {
        let (tx, subscription) = Subscription::channel();
        self.subscriptions.lock().unwrap().push((query.clone(), tx));
        Ok(subscription)
    }

    async fn add(&self, _message: NewMessage) -> Result<String, StoreError> {
        Err(StoreError::Unavailable("manual store is read-only".into()))
    }

    async fn update(&self, id: &str, _patch: MessagePatch) -> Result<(), StoreError> {
        Err(StoreError::NotFound(id.to_owned()))
    }
}

// =========================================================================
// VIEW HELPERS
// =========================================================================

pub fn stored(id: &str, user_id: &str, role: &str, content: &str, created_at: Option<i64>) -> StoredMessage {
    StoredMessage {
        id: id.to_owned(),
        user_id: user_id.to_owned(),
        role: role.to_owned(),
        content: content.to_owned(),
        created_at: created_at.map(crate::message::Timestamp),
        updated_at: created_at.map(crate::message::Timestamp),
    }
}

pub fn view(
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn MessageStore>,
    completions: Arc<dyn CompletionApi>,
) -> ChatView {
    ChatView::new(auth, store, completions, ChatConfig::default())
}

/// Wait until `pred` holds for the view state, or panic after one second.
pub async fn wait_for(view: &ChatView, pred: impl Fn(&ViewState) -> bool) -> ViewState {
    let mut rx = view.changes();
    timeout(Duration::from_secs(1), async {
        loop {
            let _ = rx.borrow_and_update();
            let state = view.state();
            if pred(&state) {
                return state;
            }
            rx.changed().await.expect("view dropped");
        }
    })
    .await
    .expect("timed out waiting for view state")
}

/// Poll `pred` until it holds, or panic after one second. For conditions
/// that do not bump the view revision (e.g. store-side state).
pub async fn wait_until(pred: impl Fn() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !pred() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}
