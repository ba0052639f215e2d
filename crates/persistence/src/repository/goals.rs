//! Goals repository — one revenue target per (user, year, month)

use crate::DbResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GoalRecord {
    pub id: i64,
    pub user_id: i64,
    pub year: i64,
    pub month: i64,
    pub target_value: String,
}

/// Repository for revenue goals
pub struct GoalRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GoalRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// update_or_create on (user, year, month)
    pub async fn upsert(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        target_value: &Decimal,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO goals (user_id, year, month, target_value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, year, month) DO UPDATE SET
                target_value = excluded.target_value
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(month)
        .bind(target_value.to_string())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<GoalRecord>> {
        let record = sqlx::query_as::<_, GoalRecord>(
            "SELECT id, user_id, year, month, target_value FROM goals WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Goals of a set of users for one calendar month.
    /// Empty `user_ids` returns the month's goals for everyone.
    pub async fn for_month(
        &self,
        user_ids: &[i64],
        year: i32,
        month: u32,
    ) -> DbResult<Vec<GoalRecord>> {
        let scope = if user_ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            format!("AND user_id IN ({placeholders})")
        };
        let sql = format!(
            "SELECT id, user_id, year, month, target_value \
             FROM goals WHERE year = ? AND month = ? {scope}"
        );

        let mut query = sqlx::query_as::<_, GoalRecord>(&sql).bind(year).bind(month);
        for id in user_ids {
            query = query.bind(id);
        }
        let records = query.fetch_all(self.pool).await?;
        Ok(records)
    }

    /// Sum of the month's targets across a set of users
    pub async fn sum_for_month(
        &self,
        user_ids: &[i64],
        year: i32,
        month: u32,
    ) -> DbResult<Decimal> {
        let scope = if user_ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            format!("AND user_id IN ({placeholders})")
        };
        let sql = format!(
            "SELECT COALESCE(SUM(CAST(target_value AS REAL)), 0) \
             FROM goals WHERE year = ? AND month = ? {scope}"
        );

        let mut query = sqlx::query_as::<_, (f64,)>(&sql).bind(year).bind(month);
        for id in user_ids {
            query = query.bind(id);
        }
        let (total,) = query.fetch_one(self.pool).await?;
        Ok(Decimal::try_from(total).unwrap_or_default().round_dp(2))
    }

    pub async fn delete(&self, id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
