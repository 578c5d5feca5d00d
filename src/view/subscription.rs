//! Realtime subscription driver.
//!
//! Follows the auth user: for each user a live query
//! (`userId == uid`, `createdAt` ascending) is opened, and every snapshot
//! replaces the view's message list. On a user change the old subscription
//! is dropped before the new one is opened, and the list is cleared so one
//! user's history never shows under another. A re-announced user with the
//! same uid keeps its subscription. With no user nothing is opened.
//!
//! Failures to open a subscription, or a subscription ending on its own, are
//! logged; there is no retry.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Shared;
use crate::auth::AuthProvider;
use crate::message::{ChatMessage, Role, sort_by_creation};
use crate::store::{MessageQuery, MessageStore, Snapshot, Subscription};

enum Event {
    UserChanged,
    AuthClosed,
    Snapshot(Option<Snapshot>),
}

pub(super) fn spawn_driver(
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn MessageStore>,
    shared: Arc<Shared>,
) -> JoinHandle<()> {
    tokio::spawn(drive(auth, store, shared))
}

async fn drive(auth: Arc<dyn AuthProvider>, store: Arc<dyn MessageStore>, shared: Arc<Shared>) {
    let mut users = auth.watch();
    let mut auth_live = true;

    loop {
        let user = users.borrow_and_update().clone();
        let mut subscription = match &user {
            Some(user) => open(store.as_ref(), &user.uid).await,
            None => {
                debug!("chat view: no user; subscription not opened");
                None
            }
        };

        loop {
            if !auth_live && subscription.is_none() {
                return;
            }
            let event = tokio::select! {
                changed = users.changed(), if auth_live => {
                    if changed.is_ok() { Event::UserChanged } else { Event::AuthClosed }
                }
                snapshot = next_snapshot(&mut subscription) => Event::Snapshot(snapshot),
            };

            match event {
                Event::UserChanged => {
                    let next_uid = users.borrow_and_update().as_ref().map(|u| u.uid.clone());
                    if next_uid.as_deref() == user.as_ref().map(|u| u.uid.as_str()) {
                        debug!("chat view: same user re-announced; subscription kept");
                        continue;
                    }
                    break;
                }
                Event::AuthClosed => {
                    debug!("chat view: auth provider gone; keeping current subscription");
                    auth_live = false;
                }
                Event::Snapshot(Some(snapshot)) => {
                    let messages = messages_from_snapshot(snapshot);
                    shared.update_if_mounted(|s| s.messages = messages);
                }
                Event::Snapshot(None) => {
                    warn!("chat view: subscription ended");
                    subscription = None;
                }
            }
        }

        drop(subscription);
        shared.update_if_mounted(|s| {
            s.messages.clear();
            s.edit_id = None;
        });
        info!(previous = ?user.map(|u| u.uid), "chat view: user changed");
    }
}

async fn open(store: &dyn MessageStore, uid: &str) -> Option<Subscription> {
    match store.subscribe(&MessageQuery::for_user(uid)).await {
        Ok(subscription) => {
            info!(%uid, "chat view: subscribed");
            Some(subscription)
        }
        Err(e) => {
            error!(error = %e, %uid, "chat view: subscribe failed");
            None
        }
    }
}

/// Next snapshot, or pending forever when there is no subscription.
async fn next_snapshot(subscription: &mut Option<Subscription>) -> Option<Snapshot> {
    match subscription.as_mut() {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

/// Full replacement list for a snapshot: unknown roles dropped, sorted by
/// creation time.
pub(super) fn messages_from_snapshot(snapshot: Snapshot) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = snapshot
        .docs
        .into_iter()
        .filter_map(|doc| {
            let Some(role) = Role::parse(&doc.role) else {
                warn!(id = %doc.id, role = %doc.role, "chat view: skipping message with unknown role");
                return None;
            };
            Some(ChatMessage {
                id: Some(doc.id),
                role,
                content: doc.content,
                created_at: doc.created_at,
                updated_at: doc.updated_at,
            })
        })
        .collect();
    sort_by_creation(&mut messages);
    messages
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
