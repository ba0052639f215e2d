//! Sales repository — fact-table upserts and the KPI aggregation queries
//!
//! Monetary columns are TEXT decimals; aggregations CAST to REAL in SQL and
//! the results are rounded back into `Decimal` (2 dp) at this boundary.

use crate::DbResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A sale row as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleRecord {
    pub id: i64,
    pub source: String,
    pub raw_id: String,
    pub client_cnpj: Option<String>,
    pub consultant_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub date: String,
    pub revenue_gross: String,
    pub revenue_net: String,
    pub volume: Option<String>,
    pub product_name: String,
    pub product_detail: String,
    pub payment_type: String,
    pub status: String,
    pub raw_client_name: String,
    pub raw_client_cnpj: String,
}

/// A sale ready to be upserted (attribution already resolved)
#[derive(Debug, Clone)]
pub struct NewSale {
    pub source: String,
    pub raw_id: String,
    pub client_cnpj: Option<String>,
    pub consultant_id: Option<i64>,
    pub manager_id: Option<i64>,
    /// `YYYY-MM-DD HH:MM:SS`
    pub date: String,
    pub revenue_gross: String,
    pub revenue_net: String,
    pub volume: Option<String>,
    pub product_name: String,
    pub product_detail: String,
    pub payment_type: String,
    pub status: String,
    pub raw_client_name: String,
    pub raw_client_cnpj: String,
}

/// Date-range / source / consultant filter shared by the aggregation queries
#[derive(Debug, Clone, Default)]
pub struct SalesFilter {
    /// Inclusive `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive `YYYY-MM-DD`
    pub end_date: Option<String>,
    pub sources: Vec<String>,
    pub consultant_ids: Vec<i64>,
}

impl SalesFilter {
    /// Build the WHERE clause and its binds for this filter
    fn where_sql(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["1=1".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(start) = &self.start_date {
            clauses.push("date(date) >= ?".to_string());
            binds.push(start.clone());
        }
        if let Some(end) = &self.end_date {
            clauses.push("date(date) <= ?".to_string());
            binds.push(end.clone());
        }
        if !self.sources.is_empty() {
            let placeholders = vec!["?"; self.sources.len()].join(", ");
            clauses.push(format!("source IN ({placeholders})"));
            binds.extend(self.sources.iter().cloned());
        }
        if !self.consultant_ids.is_empty() {
            let placeholders = vec!["?"; self.consultant_ids.len()].join(", ");
            clauses.push(format!("consultant_id IN ({placeholders})"));
            binds.extend(self.consultant_ids.iter().map(|id| id.to_string()));
        }

        (clauses.join(" AND "), binds)
    }
}

/// Period totals over the fact table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiTotals {
    pub revenue_gross: Decimal,
    pub revenue_net: Decimal,
    pub sale_count: i64,
}

/// Net/gross revenue grouped by source (pie chart)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRevenue {
    pub source: String,
    pub revenue_gross: Decimal,
    pub revenue_net: Decimal,
}

/// One month of the trend line, keyed `YYYY-MM`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue_gross: Decimal,
    pub revenue_net: Decimal,
}

/// Per-client TPV ranking row, grouped by the raw import identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPerformance {
    pub raw_client_cnpj: String,
    pub raw_client_name: String,
    pub total_tpv: Decimal,
}

/// A client of the caller's book with its period revenue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookClient {
    pub cnpj: String,
    pub client_name: String,
    pub revenue_net: Decimal,
}

/// Unattributed sales grouped by raw CNPJ, for the assignment screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanGroup {
    pub raw_client_cnpj: String,
    pub raw_client_name: String,
    pub total_revenue: Decimal,
    pub sale_count: i64,
    pub last_sale: String,
}

fn decimal_from_real(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default().round_dp(2)
}

/// Repository for the sales fact table
pub struct SaleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SaleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a batch inside one transaction, keyed on (source, raw_id).
    /// A conflicting row has its attribution and mutable data updated in
    /// place, so re-importing the same file never duplicates sales.
    /// Any failure rolls back the whole batch.
    pub async fn upsert_all(&self, sales: &[NewSale]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        for sale in sales {
            sqlx::query(
                r#"
                INSERT INTO sales (
                    source, raw_id, client_cnpj, consultant_id, manager_id,
                    date, revenue_gross, revenue_net, volume,
                    product_name, product_detail, payment_type, status,
                    raw_client_name, raw_client_cnpj
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source, raw_id) DO UPDATE SET
                    client_cnpj = excluded.client_cnpj,
                    consultant_id = excluded.consultant_id,
                    manager_id = excluded.manager_id,
                    date = excluded.date,
                    revenue_gross = excluded.revenue_gross,
                    revenue_net = excluded.revenue_net,
                    volume = excluded.volume,
                    product_name = excluded.product_name,
                    product_detail = excluded.product_detail,
                    payment_type = excluded.payment_type,
                    status = excluded.status,
                    updated_at = strftime('%s', 'now')
                "#,
            )
            .bind(&sale.source)
            .bind(&sale.raw_id)
            .bind(&sale.client_cnpj)
            .bind(sale.consultant_id)
            .bind(sale.manager_id)
            .bind(&sale.date)
            .bind(&sale.revenue_gross)
            .bind(&sale.revenue_net)
            .bind(&sale.volume)
            .bind(&sale.product_name)
            .bind(&sale.product_detail)
            .bind(&sale.payment_type)
            .bind(&sale.status)
            .bind(&sale.raw_client_name)
            .bind(&sale.raw_client_cnpj)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(sales.len())
    }

    /// TPV, net revenue, and sale count for the filtered period
    pub async fn kpi_totals(&self, filter: &SalesFilter) -> DbResult<KpiTotals> {
        let (where_sql, binds) = filter.where_sql();
        let sql = format!(
            "SELECT COALESCE(SUM(CAST(revenue_gross AS REAL)), 0), \
                    COALESCE(SUM(CAST(revenue_net AS REAL)), 0), \
                    COUNT(*) \
             FROM sales WHERE {where_sql}"
        );

        let mut query = sqlx::query_as::<_, (f64, f64, i64)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let (gross, net, count) = query.fetch_one(self.pool).await?;

        Ok(KpiTotals {
            revenue_gross: decimal_from_real(gross),
            revenue_net: decimal_from_real(net),
            sale_count: count,
        })
    }

    /// Net revenue per source, highest first
    pub async fn revenue_by_source(&self, filter: &SalesFilter) -> DbResult<Vec<SourceRevenue>> {
        let (where_sql, binds) = filter.where_sql();
        let sql = format!(
            "SELECT source, \
                    COALESCE(SUM(CAST(revenue_gross AS REAL)), 0), \
                    COALESCE(SUM(CAST(revenue_net AS REAL)), 0) \
             FROM sales WHERE {where_sql} \
             GROUP BY source \
             ORDER BY 3 DESC"
        );

        let mut query = sqlx::query_as::<_, (String, f64, f64)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query.fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(source, gross, net)| SourceRevenue {
                source,
                revenue_gross: decimal_from_real(gross),
                revenue_net: decimal_from_real(net),
            })
            .collect())
    }

    /// Monthly revenue buckets for the trend chart, oldest first
    pub async fn monthly_trend(&self, filter: &SalesFilter) -> DbResult<Vec<MonthlyRevenue>> {
        let (where_sql, binds) = filter.where_sql();
        let sql = format!(
            "SELECT strftime('%Y-%m', date) AS month, \
                    COALESCE(SUM(CAST(revenue_gross AS REAL)), 0), \
                    COALESCE(SUM(CAST(revenue_net AS REAL)), 0) \
             FROM sales WHERE {where_sql} \
             GROUP BY month \
             ORDER BY month"
        );

        let mut query = sqlx::query_as::<_, (String, f64, f64)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query.fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(month, gross, net)| MonthlyRevenue {
                month,
                revenue_gross: decimal_from_real(gross),
                revenue_net: decimal_from_real(net),
            })
            .collect())
    }

    /// Client TPV ranking grouped by raw CNPJ/name.
    /// `ascending = true` returns the weakest clients, excluding zero-TPV rows.
    pub async fn client_performance(
        &self,
        filter: &SalesFilter,
        ascending: bool,
        limit: i64,
    ) -> DbResult<Vec<ClientPerformance>> {
        let (where_sql, binds) = filter.where_sql();
        let (having, order) = if ascending {
            ("HAVING total > 0", "ASC")
        } else {
            ("", "DESC")
        };
        let sql = format!(
            "SELECT raw_client_cnpj, raw_client_name, \
                    COALESCE(SUM(CAST(revenue_gross AS REAL)), 0) AS total \
             FROM sales WHERE {where_sql} \
             GROUP BY raw_client_cnpj, raw_client_name \
             {having} \
             ORDER BY total {order} \
             LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, (String, String, f64)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query = query.bind(limit);
        let rows = query.fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(cnpj, name, total)| ClientPerformance {
                raw_client_cnpj: cnpj,
                raw_client_name: name,
                total_tpv: decimal_from_real(total),
            })
            .collect())
    }

    /// Clients of a book with their net revenue inside the period.
    /// Empty `consultant_ids` means every client (admin scope).
    pub async fn book_performance(
        &self,
        consultant_ids: &[i64],
        start_date: &str,
        end_date: &str,
    ) -> DbResult<Vec<BookClient>> {
        let scope = if consultant_ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; consultant_ids.len()].join(", ");
            format!("WHERE c.consultant_id IN ({placeholders})")
        };
        let sql = format!(
            "SELECT c.cnpj, c.client_name, \
                    COALESCE(SUM(CAST(s.revenue_net AS REAL)), 0) AS revenue \
             FROM clients c \
             LEFT JOIN sales s \
                    ON s.client_cnpj = c.cnpj \
                   AND date(s.date) >= ? AND date(s.date) <= ? \
             {scope} \
             GROUP BY c.cnpj, c.client_name \
             ORDER BY revenue DESC"
        );

        let mut query = sqlx::query_as::<_, (String, String, f64)>(&sql)
            .bind(start_date)
            .bind(end_date);
        for id in consultant_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(cnpj, client_name, revenue)| BookClient {
                cnpj,
                client_name,
                revenue_net: decimal_from_real(revenue),
            })
            .collect())
    }

    /// Distinct attributed clients with at least one sale in the period
    pub async fn active_client_count(&self, filter: &SalesFilter) -> DbResult<i64> {
        let (where_sql, binds) = filter.where_sql();
        let sql = format!(
            "SELECT COUNT(DISTINCT client_cnpj) FROM sales \
             WHERE {where_sql} AND client_cnpj IS NOT NULL"
        );

        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let (count,) = query.fetch_one(self.pool).await?;
        Ok(count)
    }

    /// Net revenue for one calendar month, optionally scoped to consultants
    pub async fn month_net_total(
        &self,
        consultant_ids: &[i64],
        year: i32,
        month: u32,
    ) -> DbResult<Decimal> {
        let scope = if consultant_ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; consultant_ids.len()].join(", ");
            format!("AND consultant_id IN ({placeholders})")
        };
        let sql = format!(
            "SELECT COALESCE(SUM(CAST(revenue_net AS REAL)), 0) FROM sales \
             WHERE strftime('%Y', date) = ? AND strftime('%m', date) = ? {scope}"
        );

        let mut query = sqlx::query_as::<_, (f64,)>(&sql)
            .bind(year.to_string())
            .bind(format!("{month:02}"));
        for id in consultant_ids {
            query = query.bind(id);
        }
        let (total,) = query.fetch_one(self.pool).await?;
        Ok(decimal_from_real(total))
    }

    /// Per-consultant net revenue for one calendar month (team roll-up)
    pub async fn month_net_by_consultant(
        &self,
        consultant_ids: &[i64],
        year: i32,
        month: u32,
    ) -> DbResult<Vec<(i64, Decimal)>> {
        if consultant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; consultant_ids.len()].join(", ");
        let sql = format!(
            "SELECT consultant_id, COALESCE(SUM(CAST(revenue_net AS REAL)), 0) \
             FROM sales \
             WHERE strftime('%Y', date) = ? AND strftime('%m', date) = ? \
               AND consultant_id IN ({placeholders}) \
             GROUP BY consultant_id"
        );

        let mut query = sqlx::query_as::<_, (i64, f64)>(&sql)
            .bind(year.to_string())
            .bind(format!("{month:02}"));
        for id in consultant_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, total)| (id, decimal_from_real(total)))
            .collect())
    }

    /// Source names seen in the fact table (filter dropdown)
    pub async fn distinct_sources(&self) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT source FROM sales ORDER BY source")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// Orphan sales grouped by raw CNPJ, most recent activity first
    pub async fn orphan_groups(&self) -> DbResult<Vec<OrphanGroup>> {
        let rows: Vec<(String, String, f64, i64, String)> = sqlx::query_as(
            "SELECT raw_client_cnpj, raw_client_name, \
                    COALESCE(SUM(CAST(revenue_net AS REAL)), 0) AS total, \
                    COUNT(*), \
                    MAX(date) \
             FROM sales \
             WHERE consultant_id IS NULL \
             GROUP BY raw_client_cnpj, raw_client_name \
             ORDER BY MAX(date) DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cnpj, name, total, count, last)| OrphanGroup {
                raw_client_cnpj: cnpj,
                raw_client_name: name,
                total_revenue: decimal_from_real(total),
                sale_count: count,
                last_sale: last,
            })
            .collect())
    }

    /// Attribute every orphan sale of a raw CNPJ to the given client and
    /// consultant, backfilling the consultant's manager. Returns rows updated.
    pub async fn assign_orphans(
        &self,
        raw_cnpj: &str,
        consultant_id: i64,
        manager_id: Option<i64>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE sales \
             SET client_cnpj = ?, consultant_id = ?, manager_id = ?, \
                 updated_at = strftime('%s', 'now') \
             WHERE raw_client_cnpj = ? AND consultant_id IS NULL",
        )
        .bind(raw_cnpj)
        .bind(consultant_id)
        .bind(manager_id)
        .bind(raw_cnpj)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Fetch one sale by its import identity (mainly for tests)
    pub async fn get_by_raw_id(&self, source: &str, raw_id: &str) -> DbResult<Option<SaleRecord>> {
        let record = sqlx::query_as::<_, SaleRecord>(
            "SELECT id, source, raw_id, client_cnpj, consultant_id, manager_id, \
                    date, revenue_gross, revenue_net, volume, \
                    product_name, product_detail, payment_type, status, \
                    raw_client_name, raw_client_cnpj \
             FROM sales WHERE source = ? AND raw_id = ?",
        )
        .bind(source)
        .bind(raw_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Total number of sale rows (mainly for tests and the import summary)
    pub async fn count_all(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sales")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
