use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{ManualReview, ReviewStatus};

#[derive(Clone)]
pub struct ManualReviewRepo {
    pool: PgPool,
}

impl ManualReviewRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the escalation row. A document may have at most one active
    /// (`pending`) ManualReview — the unique partial index
    /// `manual_reviews_one_active_per_document` (status = 'pending') is the
    /// durable enforcement; this call is expected to run only after the
    /// caller has confirmed no active review exists (worker/decision
    /// router idempotency guards upstream).
    pub async fn create(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<ManualReview> {
        let row = sqlx::query(
            r#"
            INSERT INTO manual_reviews
                (id, document_id, user_id, payload, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', now(), now())
            RETURNING id, document_id, user_id, payload, status, decision, notes,
                      buli2_task_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(document_id)
        .bind(user_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .context("failed to create manual review")?;
        Ok(row_to_review(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ManualReview>> {
        let row = sqlx::query(SELECT_COLUMNS_WHERE_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to query manual review")?;
        Ok(row.map(row_to_review))
    }

    pub async fn get_active_for_document(&self, document_id: Uuid) -> Result<Option<ManualReview>> {
        let row = sqlx::query(
            r#"
            SELECT id, document_id, user_id, payload, status, decision, notes,
                   buli2_task_id, created_at, updated_at
            FROM manual_reviews WHERE document_id = $1 AND status = 'pending'
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query active manual review")?;
        Ok(row.map(row_to_review))
    }

    /// Applies a terminal decision. Once `status` is terminal it is never
    /// mutated again, so this is a
    /// conditional update (`WHERE status = 'pending'`) — a `false` return
    /// means the review was already terminal and the caller should treat
    /// the request as a no-op replay.
    pub async fn set_terminal(
        &self,
        id: Uuid,
        status: ReviewStatus,
        decision: &str,
        notes: Option<&str>,
        buli2_task_id: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE manual_reviews
            SET status = $2, decision = $3, notes = $4, buli2_task_id = COALESCE($5, buli2_task_id), updated_at = $6
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(decision)
        .bind(notes)
        .bind(buli2_task_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to set manual review terminal state")?;
        Ok(result.rows_affected() == 1)
    }

    /// Records a terminal *forwarding* failure: the review
    /// itself stays `pending` — forwarding failure is not a review
    /// decision — but a note is attached so operators can find it.
    pub async fn set_forwarding_failed(&self, id: Uuid, note: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE manual_reviews SET notes = $2, updated_at = $3 WHERE id = $1 AND status = 'pending'"#,
        )
        .bind(id)
        .bind(note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to record forwarding failure")?;
        Ok(())
    }

    pub async fn set_ticket_id(&self, id: Uuid, ticket_id: &str) -> Result<()> {
        sqlx::query(r#"UPDATE manual_reviews SET buli2_task_id = $2 WHERE id = $1"#)
            .bind(id)
            .bind(ticket_id)
            .execute(&self.pool)
            .await
            .context("failed to set manual review ticket id")?;
        Ok(())
    }
}

const SELECT_COLUMNS_WHERE_ID: &str = r#"
    SELECT id, document_id, user_id, payload, status, decision, notes,
           buli2_task_id, created_at, updated_at
    FROM manual_reviews WHERE id = $1
"#;

fn row_to_review(row: sqlx::postgres::PgRow) -> ManualReview {
    ManualReview {
        id: row.get("id"),
        document_id: row.get("document_id"),
        user_id: row.get("user_id"),
        payload: row.get("payload"),
        status: row.get("status"),
        decision: row.get("decision"),
        notes: row.get("notes"),
        buli2_task_id: row.get("buli2_task_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
