//! Chat view: local state, rendering and edit initiation.
//!
//! ARCHITECTURE
//! ============
//! `ChatView` owns the view state behind one mutex and is handed its
//! collaborators (auth, store, completion endpoint) at construction. Two
//! writers touch the state:
//!
//! - the subscription driver (`subscription.rs`), the only writer of
//!   `messages`, replacing the list wholesale on every snapshot;
//! - user actions (`set_prompt`, `begin_edit`, `submit`, ...), which own
//!   `prompt`, `loading` and `edit_id`.
//!
//! Every state change bumps a revision counter on a `watch` channel so a
//! renderer can redraw. After `unmount` the driver is stopped and any
//! snapshot still in flight is discarded under the state lock.

mod submit;
mod subscription;

pub use submit::SubmitOutcome;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::auth::AuthProvider;
use crate::completion::CompletionApi;
use crate::config::ChatConfig;
use crate::message::{ChatMessage, Role, format_timestamp};
use crate::store::MessageStore;

pub const LABEL_SUBMIT: &str = "Submit Message";
pub const LABEL_UPDATE: &str = "Update Message";
pub const LABEL_LOADING: &str = "Loading...";

// =============================================================================
// STATE
// =============================================================================

/// Local view state. `messages` is only ever replaced from snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Draft text being composed.
    pub prompt: String,
    /// History, sorted by creation time.
    pub messages: Vec<ChatMessage>,
    /// True between the start of a submit and the end of its remote call.
    pub loading: bool,
    /// Id of the user message being edited.
    pub edit_id: Option<String>,
    mounted: bool,
}

pub(crate) struct Shared {
    state: Mutex<ViewState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        let (revision, _rx) = watch::channel(0);
        Self { state: Mutex::new(ViewState::default()), revision }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Apply `f` to the state and notify renderers.
    fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let out = f(&mut self.lock());
        self.bump();
        out
    }

    /// Like [`Shared::update`], but a no-op once the view is unmounted.
    fn update_if_mounted(&self, f: impl FnOnce(&mut ViewState)) -> bool {
        {
            let mut state = self.lock();
            if !state.mounted {
                return false;
            }
            f(&mut state);
        }
        self.bump();
        true
    }
}

// =============================================================================
// RENDERING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    /// `None` while the server timestamp is pending.
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Edit is offered for persisted user messages only.
    pub editable: bool,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub history: Vec<RenderedMessage>,
    pub prompt: String,
    pub button_label: &'static str,
    pub submit_disabled: bool,
}

fn render_state(state: &ViewState) -> RenderedView {
    let history = state
        .messages
        .iter()
        .map(|m| RenderedMessage {
            id: m.id.clone(),
            role: m.role,
            content: m.content.clone(),
            created_at: format_timestamp(m.created_at),
            updated_at: format_timestamp(m.updated_at),
            editable: m.role == Role::User && m.id.is_some(),
            editing: m.id.is_some() && m.id == state.edit_id,
        })
        .collect();

    let button_label = if state.loading {
        LABEL_LOADING
    } else if state.edit_id.is_some() {
        LABEL_UPDATE
    } else {
        LABEL_SUBMIT
    };

    RenderedView { history, prompt: state.prompt.clone(), button_label, submit_disabled: state.loading }
}

// =============================================================================
// VIEW
// =============================================================================

pub struct ChatView {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn MessageStore>,
    completions: Arc<dyn CompletionApi>,
    config: ChatConfig,
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ChatView {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn MessageStore>,
        completions: Arc<dyn CompletionApi>,
        config: ChatConfig,
    ) -> Self {
        Self { auth, store, completions, config, shared: Arc::new(Shared::new()), driver: Mutex::new(None) }
    }

    fn driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Start following the current user's messages. Must be called inside a
    /// tokio runtime. Mounting an already mounted view is a no-op.
    pub fn mount(&self) {
        let mut driver = self.driver();
        if driver.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        self.shared.update(|s| s.mounted = true);
        *driver = Some(subscription::spawn_driver(
            Arc::clone(&self.auth),
            Arc::clone(&self.store),
            Arc::clone(&self.shared),
        ));
        info!("chat view: mounted");
    }

    /// Stop the subscription. No snapshot is applied after this returns.
    pub fn unmount(&self) {
        self.shared.lock().mounted = false;
        if let Some(handle) = self.driver().take() {
            handle.abort();
            info!("chat view: unmounted");
        }
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.shared.lock().clone()
    }

    /// Revision counter, bumped on every state change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    #[must_use]
    pub fn render(&self) -> RenderedView {
        render_state(&self.shared.lock())
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.shared.update(|s| s.prompt = prompt);
    }

    /// Start editing user message `id`: its content becomes the draft.
    /// Returns `false` (no change) if `id` is not a user message in the list.
    pub fn begin_edit(&self, id: &str) -> bool {
        let started = {
            let mut state = self.shared.lock();
            let content = state
                .messages
                .iter()
                .find(|m| m.role == Role::User && m.id.as_deref() == Some(id))
                .map(|m| m.content.clone());
            match content {
                Some(content) => {
                    state.prompt = content;
                    state.edit_id = Some(id.to_owned());
                    true
                }
                None => false,
            }
        };
        if started {
            self.shared.bump();
            debug!(%id, "chat view: editing");
        }
        started
    }

    /// Abandon the current edit. The draft is kept.
    pub fn cancel_edit(&self) {
        self.shared.update(|s| s.edit_id = None);
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
