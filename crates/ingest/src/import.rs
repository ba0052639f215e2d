//! Shared import pipeline: attribution, in-batch dedup, transactional upsert
//!
//! Every source funnels its [`StagedBatch`] through [`persist_batch`], which
//! resolves the client/consultant/manager hierarchy from two pre-loaded
//! lookup maps, drops duplicate document ids inside the batch, and upserts
//! the result keyed on (source, raw_id) inside one transaction.

use std::collections::HashMap;

use persistence::repository::{ClientRepository, NewSale, SaleRepository, UserRepository};
use persistence::SqlitePool;
use serde::Serialize;
use tracing::info;

use crate::normalize::to_sql_datetime;
use crate::types::{StagedBatch, StagedSale};
use crate::ImportResult;

/// Resolved hierarchy links for one staged sale
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub client_cnpj: Option<String>,
    pub consultant_id: Option<i64>,
    pub manager_id: Option<i64>,
}

/// Pre-loaded lookup maps used to attribute a whole batch without
/// per-row queries
pub struct AttributionMaps {
    /// cnpj -> (consultant_id, manager_id) of the registered client
    clients: HashMap<String, (Option<i64>, Option<i64>)>,
    /// consultant id -> manager id, for backfilling a missing manager link
    consultant_manager: HashMap<i64, Option<i64>>,
}

impl AttributionMaps {
    pub async fn load(pool: &SqlitePool) -> ImportResult<Self> {
        let clients = ClientRepository::new(pool).all().await?;
        let consultant_manager = UserRepository::new(pool).consultant_manager_map().await?;

        let clients = clients
            .into_iter()
            .map(|c| (c.cnpj, (c.consultant_id, c.manager_id)))
            .collect();

        Ok(Self {
            clients,
            consultant_manager,
        })
    }

    /// Resolve a normalized CNPJ to its hierarchy links; unknown CNPJs
    /// stay orphaned (all `None`)
    pub fn resolve(&self, cnpj: &str) -> Attribution {
        match self.clients.get(cnpj) {
            Some((consultant_id, manager_id)) => {
                let manager_id = manager_id.or_else(|| {
                    consultant_id
                        .and_then(|cid| self.consultant_manager.get(&cid).copied().flatten())
                });
                Attribution {
                    client_cnpj: Some(cnpj.to_string()),
                    consultant_id: *consultant_id,
                    manager_id,
                }
            }
            None => Attribution::default(),
        }
    }
}

/// Counters of one import run, recorded in the audit trail
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportOutcome {
    pub rows_found: usize,
    pub rows_processed: usize,
    pub rows_saved: usize,
    pub orphans_found: usize,
}

/// Drop duplicate document ids within a batch; the last occurrence wins,
/// keeping the position of the first (same as rebuilding a keyed map)
pub fn dedupe_by_raw_id(staged: Vec<StagedSale>) -> Vec<StagedSale> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<StagedSale> = Vec::with_capacity(staged.len());

    for sale in staged {
        match index.get(&sale.raw_id) {
            Some(&i) => unique[i] = sale,
            None => {
                index.insert(sale.raw_id.clone(), unique.len());
                unique.push(sale);
            }
        }
    }

    unique
}

/// Attribute, dedupe, and upsert a staged batch inside one transaction.
/// Returns the run counters; any database failure rolls back every row.
pub async fn persist_batch(pool: &SqlitePool, batch: StagedBatch) -> ImportResult<ImportOutcome> {
    let maps = AttributionMaps::load(pool).await?;
    let unique = dedupe_by_raw_id(batch.staged);

    let mut orphans_found = 0;
    let sales: Vec<NewSale> = unique
        .into_iter()
        .map(|sale| {
            let attribution = maps.resolve(&sale.cnpj);
            if attribution.consultant_id.is_none() {
                orphans_found += 1;
            }
            NewSale {
                source: batch.source.to_string(),
                raw_id: sale.raw_id,
                client_cnpj: attribution.client_cnpj,
                consultant_id: attribution.consultant_id,
                manager_id: attribution.manager_id,
                date: to_sql_datetime(&sale.date),
                revenue_gross: sale.revenue_gross.to_string(),
                revenue_net: sale.revenue_net.to_string(),
                volume: sale.volume.map(|v| v.to_string()),
                product_name: sale.product_name,
                product_detail: sale.product_detail,
                payment_type: sale.payment_type,
                status: sale.status,
                raw_client_name: sale.client_name,
                raw_client_cnpj: sale.cnpj,
            }
        })
        .collect();

    let rows_saved = SaleRepository::new(pool).upsert_all(&sales).await?;

    info!(
        source = batch.source,
        rows_found = batch.rows_found,
        rows_processed = batch.rows_processed,
        rows_saved,
        orphans_found,
        "Import batch persisted"
    );

    Ok(ImportOutcome {
        rows_found: batch.rows_found,
        rows_processed: batch.rows_processed,
        rows_saved,
        orphans_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use persistence::repository::{NewUser, SaleRepository, UserRepository};
    use persistence::Database;
    use rust_decimal_macros::dec;

    fn staged(raw_id: &str, cnpj: &str, net: rust_decimal::Decimal) -> StagedSale {
        StagedSale {
            raw_id: raw_id.to_string(),
            cnpj: cnpj.to_string(),
            client_name: "Posto Alfa".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            revenue_gross: net * dec!(10),
            revenue_net: net,
            volume: None,
            product_name: "Combustível".to_string(),
            product_detail: String::new(),
            payment_type: String::new(),
            status: "Pago".to_string(),
        }
    }

    fn batch_of(staged_sales: Vec<StagedSale>) -> StagedBatch {
        StagedBatch {
            source: "Rovema Pay",
            rows_found: staged_sales.len(),
            rows_processed: staged_sales.len(),
            staged: staged_sales,
        }
    }

    #[test]
    fn test_dedupe_last_occurrence_wins() {
        let sales = vec![
            staged("ROVEMA_1_1", "12345678000195", dec!(10)),
            staged("ROVEMA_1_2", "12345678000195", dec!(20)),
            staged("ROVEMA_1_1", "12345678000195", dec!(30)),
        ];
        let unique = dedupe_by_raw_id(sales);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].raw_id, "ROVEMA_1_1");
        assert_eq!(unique[0].revenue_net, dec!(30));
        assert_eq!(unique[1].raw_id, "ROVEMA_1_2");
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        let first = batch_of(vec![
            staged("ROVEMA_1_1", "12345678000195", dec!(10)),
            staged("ROVEMA_2_1", "98765432000110", dec!(20)),
        ]);
        let outcome = persist_batch(pool, first).await.unwrap();
        assert_eq!(outcome.rows_saved, 2);
        assert_eq!(outcome.orphans_found, 2);

        // Same document ids again, one with an updated value
        let second = batch_of(vec![
            staged("ROVEMA_1_1", "12345678000195", dec!(15)),
            staged("ROVEMA_2_1", "98765432000110", dec!(20)),
        ]);
        persist_batch(pool, second).await.unwrap();

        let repo = SaleRepository::new(pool);
        assert_eq!(repo.count_all().await.unwrap(), 2);
        let updated = repo
            .get_by_raw_id("Rovema Pay", "ROVEMA_1_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.revenue_net, "15");
    }

    #[tokio::test]
    async fn test_orphans_attributed_after_assignment() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        // Import before any client is registered: everything orphans
        let outcome = persist_batch(
            pool,
            batch_of(vec![
                staged("ROVEMA_1_1", "12345678000195", dec!(10)),
                staged("ROVEMA_2_1", "12345678000195", dec!(20)),
            ]),
        )
        .await
        .unwrap();
        assert_eq!(outcome.orphans_found, 2);

        let users = UserRepository::new(pool);
        let manager_id = users
            .create(&NewUser {
                email: "manager@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "Gina".to_string(),
                last_name: "Souza".to_string(),
                role: "manager".to_string(),
                manager_id: None,
            })
            .await
            .unwrap();
        let consultant_id = users
            .create(&NewUser {
                email: "consultant@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "Caio".to_string(),
                last_name: "Lima".to_string(),
                role: "consultant".to_string(),
                manager_id: Some(manager_id),
            })
            .await
            .unwrap();

        // The explicit assignment action: upsert the client, then backfill
        ClientRepository::new(pool)
            .upsert(
                "12345678000195",
                "Posto Alfa",
                Some(consultant_id),
                Some(manager_id),
            )
            .await
            .unwrap();
        let sales = SaleRepository::new(pool);
        let assigned = sales
            .assign_orphans("12345678000195", consultant_id, Some(manager_id))
            .await
            .unwrap();
        assert_eq!(assigned, 2);

        assert!(sales.orphan_groups().await.unwrap().is_empty());
        let sale = sales
            .get_by_raw_id("Rovema Pay", "ROVEMA_2_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sale.consultant_id, Some(consultant_id));
        assert_eq!(sale.manager_id, Some(manager_id));
        assert_eq!(sale.client_cnpj.as_deref(), Some("12345678000195"));
    }

    #[tokio::test]
    async fn test_attribution_resolves_known_client() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        let users = UserRepository::new(pool);
        let manager_id = users
            .create(&NewUser {
                email: "manager@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "Gina".to_string(),
                last_name: "Souza".to_string(),
                role: "manager".to_string(),
                manager_id: None,
            })
            .await
            .unwrap();
        let consultant_id = users
            .create(&NewUser {
                email: "consultant@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "Caio".to_string(),
                last_name: "Lima".to_string(),
                role: "consultant".to_string(),
                manager_id: Some(manager_id),
            })
            .await
            .unwrap();

        // Client registered without its manager denormalized
        ClientRepository::new(pool)
            .upsert("12345678000195", "Posto Alfa", Some(consultant_id), None)
            .await
            .unwrap();

        let outcome = persist_batch(
            pool,
            batch_of(vec![
                staged("ROVEMA_1_1", "12345678000195", dec!(10)),
                staged("ROVEMA_9_1", "00000000000191", dec!(5)),
            ]),
        )
        .await
        .unwrap();

        // Only the unknown CNPJ stays orphaned
        assert_eq!(outcome.orphans_found, 1);

        let sale = SaleRepository::new(pool)
            .get_by_raw_id("Rovema Pay", "ROVEMA_1_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sale.consultant_id, Some(consultant_id));
        // Manager backfilled from the consultant's hierarchy link
        assert_eq!(sale.manager_id, Some(manager_id));
        assert_eq!(sale.client_cnpj.as_deref(), Some("12345678000195"));
    }
}
