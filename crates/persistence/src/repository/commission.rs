//! Commission rules repository — one percentage-of-net rule per source

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommissionRuleRecord {
    pub id: i64,
    pub rule_name: String,
    pub source: String,
    pub percentage: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Repository for commission rules
pub struct CommissionRuleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommissionRuleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        rule_name: &str,
        source: &str,
        percentage: &str,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO commission_rules (rule_name, source, percentage) VALUES (?, ?, ?)",
        )
        .bind(rule_name)
        .bind(source)
        .bind(percentage)
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<CommissionRuleRecord>> {
        let record = sqlx::query_as::<_, CommissionRuleRecord>(
            "SELECT id, rule_name, source, percentage, created_at, updated_at \
             FROM commission_rules WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list(&self) -> DbResult<Vec<CommissionRuleRecord>> {
        let records = sqlx::query_as::<_, CommissionRuleRecord>(
            "SELECT id, rule_name, source, percentage, created_at, updated_at \
             FROM commission_rules ORDER BY source",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// source -> percentage map for the commission KPI
    pub async fn percentage_by_source(&self) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT source, percentage FROM commission_rules")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn update(
        &self,
        id: i64,
        rule_name: &str,
        source: &str,
        percentage: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE commission_rules \
             SET rule_name = ?, source = ?, percentage = ?, updated_at = strftime('%s', 'now') \
             WHERE id = ?",
        )
        .bind(rule_name)
        .bind(source)
        .bind(percentage)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM commission_rules WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
