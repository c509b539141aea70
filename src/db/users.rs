use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{User, VerificationStatus};

#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Created lazily on first successful auth-token verification: the
    /// `sub`/`email` pair comes from the external identity provider and
    /// is never re-derived here.
    pub async fn get_or_create(&self, sub: &str, email: &str) -> Result<User> {
        if let Some(existing) = self.find_by_sub(sub).await? {
            return Ok(existing);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, sub, email, verification_status, created_at)
            VALUES ($1, $2, $3, 'pending', now())
            ON CONFLICT (sub) DO UPDATE SET sub = EXCLUDED.sub
            RETURNING id, sub, email, verification_status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sub)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .context("failed to upsert user")?;

        Ok(row_to_user(row))
    }

    pub async fn find_by_sub(&self, sub: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"SELECT id, sub, email, verification_status, created_at FROM users WHERE sub = $1"#,
        )
        .bind(sub)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query user by sub")?;

        Ok(row.map(row_to_user))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"SELECT id, sub, email, verification_status, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query user")?;

        Ok(row.map(row_to_user))
    }

    /// Applies the monotonic join rule's result. Callers
    /// compute the new status via `crate::decision::recompute_user_status`
    /// and persist it here unconditionally — the join is idempotent by
    /// construction, so there is no compare-and-swap to worry about.
    pub async fn set_verification_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<()> {
        sqlx::query(r#"UPDATE users SET verification_status = $2 WHERE id = $1"#)
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .context("failed to update user verification_status")?;
        Ok(())
    }
}

fn row_to_user(row: sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        sub: row.get("sub"),
        email: row.get("email"),
        verification_status: row.get("verification_status"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    // UserRepo is a thin wrapper over SQL; its behavior is exercised via
    // the decision-router integration tests, which use an in-memory fake
    // rather than a live Postgres instance (see `crate::decision::tests`).
}
