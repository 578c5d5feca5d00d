//! Postgres-backed message store with live queries over LISTEN/NOTIFY.
//!
//! DESIGN
//! ======
//! A trigger on `messages` calls `pg_notify('messages_changed', user_id)`
//! for every row change. Each subscription owns a `PgListener` and, on a
//! notification for its user, re-reads the whole ordered result set and
//! pushes it as one snapshot.
//!
//! The listener is connected before the initial read, so a write that lands
//! between the two still produces a follow-up snapshot. `ServerTime` maps to
//! `now()` inside the write, so Postgres never reports a pending timestamp.

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{
    MessagePatch, MessageQuery, MessageStore, NewMessage, Snapshot, SnapshotSender, StoreError, StoredMessage,
    Subscription, WriteTimestamp,
};
use crate::message::Timestamp;

const NOTIFY_CHANNEL: &str = "messages_changed";

type MessageRow = (Uuid, String, String, String, Option<i64>, Option<i64>);

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Explicit write time in ms, or `None` to let the database use `now()`.
fn explicit_ms(ts: WriteTimestamp) -> Option<i64> {
    match ts {
        WriteTimestamp::ServerTime => None,
        WriteTimestamp::At(ts) => Some(ts.millis()),
    }
}

async fn load_snapshot(pool: &PgPool, user_id: &str) -> Result<Snapshot, StoreError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, user_id, role, content,
                (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT,
                (EXTRACT(EPOCH FROM updated_at) * 1000)::BIGINT
         FROM messages
         WHERE user_id = $1
         ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let docs = rows
        .into_iter()
        .map(|(id, user_id, role, content, created_ms, updated_ms)| StoredMessage {
            id: id.to_string(),
            user_id,
            role,
            content,
            created_at: created_ms.map(Timestamp),
            updated_at: updated_ms.map(Timestamp),
        })
        .collect();
    Ok(Snapshot { docs })
}

async fn feed_subscription(pool: PgPool, mut listener: PgListener, user_id: String, tx: SnapshotSender) {
    loop {
        let notification = tokio::select! {
            () = tx.closed() => break,
            n = listener.recv() => n,
        };
        match notification {
            Ok(n) if n.payload() == user_id => match load_snapshot(&pool, &user_id).await {
                Ok(snapshot) => {
                    if tx.send(snapshot).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, %user_id, "pg store: snapshot reload failed"),
            },
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, %user_id, "pg store: listener failed; ending subscription");
                break;
            }
        }
    }
    debug!(%user_id, "pg store: subscription closed");
}

/// Without a listener there is no live query, so the store counts as down.
fn listener_unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("{NOTIFY_CHANNEL} listener: {e}"))
}

#[async_trait::async_trait]
impl MessageStore for PgStore {
    async fn subscribe(&self, query: &MessageQuery) -> Result<Subscription, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(listener_unavailable)?;
        listener.listen(NOTIFY_CHANNEL).await.map_err(listener_unavailable)?;

        let initial = load_snapshot(&self.pool, &query.user_id).await?;
        let (tx, subscription) = Subscription::channel();
        let _ = tx.send(initial);

        tokio::spawn(feed_subscription(self.pool.clone(), listener, query.user_id.clone(), tx));
        debug!(user_id = %query.user_id, "pg store: subscribed");
        Ok(subscription)
    }

    async fn add(&self, message: NewMessage) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO messages (id, user_id, role, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4,
                     COALESCE(to_timestamp($5::DOUBLE PRECISION / 1000), now()),
                     COALESCE(to_timestamp($6::DOUBLE PRECISION / 1000), now()))",
        )
        .bind(id)
        .bind(&message.user_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(explicit_ms(message.created_at))
        .bind(explicit_ms(message.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(%id, user_id = %message.user_id, role = %message.role, "pg store: added");
        Ok(id.to_string())
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<(), StoreError> {
        let uuid = Uuid::parse_str(id).map_err(|_| StoreError::NotFound(id.to_owned()))?;
        let result = sqlx::query(
            "UPDATE messages
             SET content = $2,
                 updated_at = COALESCE(to_timestamp($3::DOUBLE PRECISION / 1000), now())
             WHERE id = $1",
        )
        .bind(uuid)
        .bind(&patch.content)
        .bind(explicit_ms(patch.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        debug!(%id, "pg store: updated");
        Ok(())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
