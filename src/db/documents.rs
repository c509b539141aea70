use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{Document, DocumentStatus, DocumentType, VerificationStatus};

#[derive(Clone)]
pub struct DocumentRepo {
    pool: PgPool,
}

impl DocumentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user_id: Uuid, doc_type: DocumentType, blob_key: &str) -> Result<Document> {
        let row = sqlx::query(
            r#"
            INSERT INTO documents
                (id, user_id, doc_type, blob_key, status, verification_status, created_at)
            VALUES ($1, $2, $3, $4, 'uploaded', 'pending', now())
            RETURNING id, user_id, doc_type, blob_key, status, verification_status,
                      ai_score, ai_decision, result_json, ocr_text,
                      created_at, processed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(doc_type)
        .bind(blob_key)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert document")?;

        Ok(row_to_document(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(SELECT_COLUMNS_WHERE_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to query document")?;
        Ok(row.map(row_to_document))
    }

    /// Ownership-scoped lookup. Callers return 404 (not 403) when this
    /// yields `None` for a document that does exist but belongs to
    /// someone else, to avoid ownership enumeration.
    pub async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .get(id)
            .await?
            .filter(|d| d.user_id == user_id))
    }

    /// `uploaded -> processing`. Returns `true` if this call performed
    /// the transition, `false` if the row was already `processing` (the
    /// lock, not this row, is the mutual-exclusion primitive — the
    /// worker proceeds regardless).
    pub async fn transition_to_processing(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE documents SET status = 'processing' WHERE id = $1 AND status = 'uploaded'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to transition document to processing")?;
        Ok(result.rows_affected() == 1)
    }

    /// Persist a terminal post-OCR outcome.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_completed(
        &self,
        id: Uuid,
        ocr_text: &str,
        result_json: serde_json::Value,
        ai_score: i32,
        ai_decision: &str,
        verification_status: VerificationStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'completed',
                ocr_text = $2,
                result_json = $3,
                ai_score = $4,
                ai_decision = $5,
                verification_status = $6,
                processed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ocr_text)
        .bind(result_json)
        .bind(ai_score)
        .bind(ai_decision)
        .bind(verification_status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to mark document completed")?;
        Ok(())
    }

    /// Persists `{error, failedAt, maxRetriesExceeded: true}` after the
    /// attempt budget is exhausted.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let result_json = serde_json::json!({
            "error": error,
            "failedAt": Utc::now(),
            "maxRetriesExceeded": true,
        });
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'failed', result_json = $2, processed_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to mark document failed")?;
        Ok(())
    }

    /// Forced recovery transition used by the reaper and by startup
    /// recovery. Only takes effect if the row is still `processing` — a
    /// document that raced ahead to `completed`/`failed` is left alone.
    pub async fn reset_to_uploaded(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE documents SET status = 'uploaded' WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to reset document to uploaded")?;
        Ok(result.rows_affected() == 1)
    }

    /// Explicit-evaluation pathway and callback reconciliation both land
    /// here: update the verification outcome of an already-`completed`
    /// document without touching its processing lifecycle.
    pub async fn set_verification_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<()> {
        sqlx::query(r#"UPDATE documents SET verification_status = $2 WHERE id = $1"#)
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .context("failed to update document verification_status")?;
        Ok(())
    }

    /// Startup recovery: every row stuck `processing` across a crash.
    pub async fn list_stuck_processing(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, doc_type, blob_key, status, verification_status,
                   ai_score, ai_decision, result_json, ocr_text,
                   created_at, processed_at
            FROM documents WHERE status = 'processing'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list stuck processing documents")?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    /// Startup recovery: ids of documents still in an active lifecycle
    /// state, used to decide which queue entries are orphaned rather
    /// than merely in flight.
    pub async fn list_active_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"SELECT id FROM documents WHERE status IN ('uploaded', 'processing')"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list active document ids")?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, doc_type, blob_key, status, verification_status,
                   ai_score, ai_decision, result_json, ocr_text,
                   created_at, processed_at
            FROM documents WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list documents by user")?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    /// Snapshot of document counts by processing status, for `/metrics`.
    pub async fn count_by_status(&self) -> Result<Vec<(DocumentStatus, i64)>> {
        let rows = sqlx::query(r#"SELECT status, count(*) AS n FROM documents GROUP BY status"#)
            .fetch_all(&self.pool)
            .await
            .context("failed to count documents by status")?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("status"), r.get("n")))
            .collect())
    }
}

const SELECT_COLUMNS_WHERE_ID: &str = r#"
    SELECT id, user_id, doc_type, blob_key, status, verification_status,
           ai_score, ai_decision, result_json, ocr_text,
           created_at, processed_at
    FROM documents WHERE id = $1
"#;

fn row_to_document(row: sqlx::postgres::PgRow) -> Document {
    Document {
        id: row.get("id"),
        user_id: row.get("user_id"),
        doc_type: row.get("doc_type"),
        blob_key: row.get("blob_key"),
        status: row.get("status"),
        verification_status: row.get("verification_status"),
        ai_score: row.get("ai_score"),
        ai_decision: row.get("ai_decision"),
        result_json: row.get("result_json"),
        ocr_text: row.get("ocr_text"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
    }
}
