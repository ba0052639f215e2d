//! Sessions repository — refresh tokens stored by SHA-256 hash only

use crate::DbResult;
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Repository for refresh-token sessions
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, token_hash: &str, expires_at: i64) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a non-expired session by token hash
    pub async fn find_valid(&self, token_hash: &str, now: i64) -> DbResult<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, token_hash, expires_at, created_at \
             FROM sessions WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Revoke one session (logout)
    pub async fn delete_by_hash(&self, token_hash: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drop expired sessions; returns how many were removed
    pub async fn purge_expired(&self, now: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
