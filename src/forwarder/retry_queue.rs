//! Fallback retry queue for envelopes the Forwarder could not deliver
//! immediately, persisted in Postgres alongside the rest of the State
//! Store rather than a literal keyed list (the external `buli2`
//! reviewer's own retry list) — same substitution rationale as
//! `crate::queue::substrate`.
//!
//! Assumed schema:
//! ```sql
//! CREATE TABLE forwarder_retry_queue (
//!     id uuid PRIMARY KEY,
//!     review_id uuid NOT NULL,
//!     envelope jsonb NOT NULL,
//!     attempt integer NOT NULL DEFAULT 0,
//!     first_queued_at timestamptz NOT NULL DEFAULT now()
//! );
//! ```

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::decision::ReviewEnvelope;

pub struct QueuedEnvelope {
    pub id: Uuid,
    pub envelope: ReviewEnvelope,
    pub attempt: i32,
}

#[derive(Clone)]
pub struct RetryQueue {
    pool: PgPool,
}

impl RetryQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn push(&self, envelope: &ReviewEnvelope) -> Result<()> {
        let payload = serde_json::to_value(envelope).context("failed to serialize review envelope")?;
        sqlx::query(
            r#"
            INSERT INTO forwarder_retry_queue (id, review_id, envelope, attempt, first_queued_at)
            VALUES ($1, $2, $3, 0, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(envelope.review_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .context("failed to push envelope onto forwarder retry queue")?;
        Ok(())
    }

    /// Pops every currently-queued envelope for a single drain pass. The
    /// drainer is expected to call `mark_attempt_failed`/`remove` on each
    /// as it resolves, so nothing here claims rows out from under a
    /// concurrent drainer — only one drainer task runs at a time (spec
    /// §5: "drained by the drainer only").
    pub async fn list_all(&self) -> Result<Vec<QueuedEnvelope>> {
        let rows = sqlx::query(r#"SELECT id, envelope, attempt FROM forwarder_retry_queue ORDER BY first_queued_at ASC"#)
            .fetch_all(&self.pool)
            .await
            .context("failed to list forwarder retry queue")?;

        rows.into_iter()
            .map(|row| {
                let envelope: serde_json::Value = row.get("envelope");
                let envelope: ReviewEnvelope =
                    serde_json::from_value(envelope).context("failed to deserialize queued review envelope")?;
                Ok(QueuedEnvelope {
                    id: row.get("id"),
                    envelope,
                    attempt: row.get("attempt"),
                })
            })
            .collect()
    }

    pub async fn increment_attempt(&self, id: Uuid) -> Result<i32> {
        let row = sqlx::query(r#"UPDATE forwarder_retry_queue SET attempt = attempt + 1 WHERE id = $1 RETURNING attempt"#)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("failed to increment forwarder retry attempt")?;
        Ok(row.get("attempt"))
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM forwarder_retry_queue WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to remove envelope from forwarder retry queue")?;
        Ok(())
    }

    pub async fn depth(&self) -> Result<i64> {
        let row = sqlx::query(r#"SELECT count(*) AS n FROM forwarder_retry_queue"#)
            .fetch_one(&self.pool)
            .await
            .context("failed to count forwarder retry queue")?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    // `RetryQueue` is a thin SQL wrapper; its drain semantics are
    // exercised end-to-end via `forwarder::drainer::tests` against an
    // in-memory fake rather than a live Postgres instance.
}
