//! Clients repository — CNPJ-keyed accounts with denormalized manager link

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A client row, keyed by its 14-digit CNPJ
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientRecord {
    pub cnpj: String,
    pub client_name: String,
    pub consultant_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Repository for clients
pub struct ClientRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClientRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the mutable fields of a client (update_or_create on cnpj)
    pub async fn upsert(
        &self,
        cnpj: &str,
        client_name: &str,
        consultant_id: Option<i64>,
        manager_id: Option<i64>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (cnpj, client_name, consultant_id, manager_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(cnpj) DO UPDATE SET
                client_name = excluded.client_name,
                consultant_id = excluded.consultant_id,
                manager_id = excluded.manager_id,
                updated_at = strftime('%s', 'now')
            "#,
        )
        .bind(cnpj)
        .bind(client_name)
        .bind(consultant_id)
        .bind(manager_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, cnpj: &str) -> DbResult<Option<ClientRecord>> {
        let record = sqlx::query_as::<_, ClientRecord>(
            "SELECT cnpj, client_name, consultant_id, manager_id, created_at, updated_at \
             FROM clients WHERE cnpj = ?",
        )
        .bind(cnpj)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Every client, used to build the import attribution maps
    pub async fn all(&self) -> DbResult<Vec<ClientRecord>> {
        let records = sqlx::query_as::<_, ClientRecord>(
            "SELECT cnpj, client_name, consultant_id, manager_id, created_at, updated_at \
             FROM clients ORDER BY client_name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Number of clients in a consultant's (or whole team's) book.
    /// Empty `consultant_ids` counts all clients.
    pub async fn count_for(&self, consultant_ids: &[i64]) -> DbResult<i64> {
        if consultant_ids.is_empty() {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
                .fetch_one(self.pool)
                .await?;
            return Ok(count);
        }

        let placeholders = vec!["?"; consultant_ids.len()].join(", ");
        let sql = format!("SELECT COUNT(*) FROM clients WHERE consultant_id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for id in consultant_ids {
            query = query.bind(id);
        }
        let (count,) = query.fetch_one(self.pool).await?;
        Ok(count)
    }
}
