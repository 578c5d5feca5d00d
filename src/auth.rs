//! Auth collaborator: who is the current user.
//!
//! The view only needs a stable uid and a way to observe sign-in changes,
//! so the contract is a current value plus a `watch` receiver.

use tokio::sync::watch;
use tracing::info;

/// Authenticated user as seen by the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub display_name: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), display_name: None }
    }
}

/// Source of the current user. `None` means signed out.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    /// Receiver that is notified whenever the current user changes.
    fn watch(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// In-process auth session backed by a watch channel.
pub struct SessionAuth {
    tx: watch::Sender<Option<AuthUser>>,
}

impl SessionAuth {
    #[must_use]
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn signed_in(user: AuthUser) -> Self {
        let (tx, _rx) = watch::channel(Some(user));
        Self { tx }
    }

    /// Switch to `user`. Re-signing the same uid is not a change.
    pub fn sign_in(&self, user: AuthUser) {
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref().is_some_and(|u| u.uid == user.uid) {
                return false;
            }
            *current = Some(user.clone());
            true
        });
        if changed {
            info!(uid = %user.uid, "auth: signed in");
        }
    }

    pub fn sign_out(&self) {
        let changed = self.tx.send_if_modified(|current| current.take().is_some());
        if changed {
            info!("auth: signed out");
        }
    }
}

impl AuthProvider for SessionAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
