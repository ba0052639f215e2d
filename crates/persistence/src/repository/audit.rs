//! Audit log repository — append-only record of user and import actions

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub timestamp: i64,
    pub action: String,
    /// JSON payload serialized to TEXT
    pub details: Option<String>,
}

impl AuditLogRecord {
    /// Parse the details payload back into JSON (null if absent/corrupt)
    pub fn details_json(&self) -> serde_json::Value {
        self.details
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Repository for the audit trail
pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn write(
        &self,
        user_id: Option<i64>,
        action: &str,
        details: &serde_json::Value,
    ) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO audit_logs (user_id, action, details) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(action)
            .bind(details.to_string())
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent entries matching any of the given actions, newest first.
    /// Empty `actions` returns entries of every action.
    pub async fn recent(&self, actions: &[&str], limit: i64) -> DbResult<Vec<AuditLogRecord>> {
        let scope = if actions.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; actions.len()].join(", ");
            format!("WHERE action IN ({placeholders})")
        };
        let sql = format!(
            "SELECT id, user_id, timestamp, action, details \
             FROM audit_logs {scope} \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, AuditLogRecord>(&sql);
        for action in actions {
            query = query.bind(*action);
        }
        query = query.bind(limit);

        let records = query.fetch_all(self.pool).await?;
        Ok(records)
    }
}
