//! Submission / update handler.
//!
//! One turn is: write the user message (or rewrite the edited one), ask the
//! completion endpoint, append the assistant reply. The two writes are not
//! transactional: if the remote call fails after the user message was
//! written, that message stays persisted without a reply.
//!
//! Every failure in a turn takes the same path: log, keep the draft, drop the
//! loading flag. The edit marker is cleared as soon as the update write
//! succeeds, so it is only retained when that write itself fails.

use tracing::{debug, error, info};

use super::ChatView;
use crate::completion::{ChatRequest, CompletionError};
use crate::config::MAX_CHAT_CONTEXT_MESSAGES;
use crate::message::{ContextMessage, Role, tail_context};
use crate::store::{MessagePatch, NewMessage, StoreError, WriteTimestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty draft or no user: nothing was written or sent.
    Skipped,
    /// Both writes and the remote call succeeded; the draft was cleared.
    Completed,
    /// Something failed after loading started; see the logs.
    Failed,
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Inputs of one turn, captured when loading starts.
struct Turn {
    prompt: String,
    edit_id: Option<String>,
    /// Tail of the list as it was before this turn's writes.
    context: Vec<ContextMessage>,
}

impl ChatView {
    /// Submit the draft, or the edit in progress.
    pub async fn submit(&self) -> SubmitOutcome {
        let Some(user) = self.auth.current_user() else {
            debug!("chat view: submit ignored; no user");
            return SubmitOutcome::Skipped;
        };
        let Some(turn) = self.begin_turn() else {
            debug!(uid = %user.uid, "chat view: submit ignored; empty draft");
            return SubmitOutcome::Skipped;
        };

        info!(
            uid = %user.uid,
            editing = turn.edit_id.is_some(),
            context = turn.context.len(),
            "chat view: submitting"
        );

        let outcome = match self.run_turn(&user.uid, &turn).await {
            Ok(()) => SubmitOutcome::Completed,
            Err(e) => {
                error!(error = %e, uid = %user.uid, "chat view: submit failed");
                SubmitOutcome::Failed
            }
        };

        self.shared.update(|s| {
            if outcome == SubmitOutcome::Completed {
                s.prompt.clear();
            }
            s.loading = false;
        });
        outcome
    }

    /// Check the draft and enter loading. `None` leaves state untouched.
    fn begin_turn(&self) -> Option<Turn> {
        let context_messages = self.config.context_messages.min(MAX_CHAT_CONTEXT_MESSAGES);
        let turn = {
            let mut state = self.shared.lock();
            if state.prompt.trim().is_empty() {
                return None;
            }
            state.loading = true;
            Turn {
                prompt: state.prompt.clone(),
                edit_id: state.edit_id.clone(),
                context: tail_context(&state.messages, context_messages),
            }
        };
        self.shared.bump();
        Some(turn)
    }

    async fn run_turn(&self, uid: &str, turn: &Turn) -> Result<(), TurnError> {
        if let Some(id) = &turn.edit_id {
            self.store
                .update(id, MessagePatch { content: turn.prompt.clone(), updated_at: WriteTimestamp::ServerTime })
                .await?;
            self.shared.update(|s| {
                if s.edit_id.as_ref() == Some(id) {
                    s.edit_id = None;
                }
            });
        } else {
            self.store
                .add(NewMessage::server_timed(uid, Role::User, turn.prompt.clone()))
                .await?;
        }

        let request = ChatRequest { prompt: turn.prompt.clone(), messages: turn.context.clone() };
        let completion = self.completions.complete(&request).await?;
        let reply = completion.top_content()?;

        self.store
            .add(NewMessage::server_timed(uid, Role::Assistant, reply))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "submit_test.rs"]
mod tests;
