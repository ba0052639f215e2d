//! Users repository — account records and the consultant/manager hierarchy

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

/// A user account row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub manager_id: Option<i64>,
    pub is_active: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub manager_id: Option<i64>,
}

/// Mutable fields for updating an existing user
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub manager_id: Option<i64>,
    pub is_active: bool,
}

const SELECT_COLS: &str = "id, email, password_hash, first_name, last_name, role, \
                           manager_id, is_active, created_at, updated_at";

/// Repository for user accounts
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &NewUser) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, manager_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.role)
        .bind(user.manager_id)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<UserRecord>> {
        let sql = format!("SELECT {SELECT_COLS} FROM users WHERE id = ?");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<UserRecord>> {
        let sql = format!("SELECT {SELECT_COLS} FROM users WHERE email = ?");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    /// All users, consultants first within each role group
    pub async fn list(&self) -> DbResult<Vec<UserRecord>> {
        let sql = format!("SELECT {SELECT_COLS} FROM users ORDER BY role, first_name, email");
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(records)
    }

    /// All consultants, optionally restricted to one manager's team
    pub async fn list_consultants(&self, manager_id: Option<i64>) -> DbResult<Vec<UserRecord>> {
        let records = match manager_id {
            Some(mid) => {
                let sql = format!(
                    "SELECT {SELECT_COLS} FROM users \
                     WHERE role = 'consultant' AND manager_id = ? \
                     ORDER BY first_name, email"
                );
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(mid)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {SELECT_COLS} FROM users \
                     WHERE role = 'consultant' ORDER BY first_name, email"
                );
                sqlx::query_as::<_, UserRecord>(&sql)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        Ok(records)
    }

    /// Ids of the consultants reporting to the given manager
    pub async fn team_ids(&self, manager_id: i64) -> DbResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE manager_id = ?")
            .bind(manager_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// consultant id -> manager id map, used by the import attribution step
    pub async fn consultant_manager_map(&self) -> DbResult<HashMap<i64, Option<i64>>> {
        let rows: Vec<(i64, Option<i64>)> =
            sqlx::query_as("SELECT id, manager_id FROM users WHERE role = 'consultant'")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn update(&self, id: i64, update: &UserUpdate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, first_name = ?, last_name = ?, role = ?, manager_id = ?,
                is_active = ?, updated_at = strftime('%s', 'now')
            WHERE id = ?
            "#,
        )
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.role)
        .bind(update.manager_id)
        .bind(update.is_active as i64)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = strftime('%s', 'now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
