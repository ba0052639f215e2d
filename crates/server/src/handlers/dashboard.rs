//! General dashboard: period KPIs, charts, and client rankings

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use ingest::kpi;
use persistence::repository::{
    CommissionRuleRepository, SaleRepository, SalesFilter, UserRepository,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::AppResult;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Deserialize)]
pub struct DashboardParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Comma-separated source names
    pub sources: Option<String>,
    /// Comma-separated consultant ids
    pub consultants: Option<String>,
}

/// Parse `YYYY-MM-DD`, falling back to the given default on bad input
fn parse_date_or(value: Option<&str>, default: NaiveDate) -> NaiveDate {
    value
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or(default)
}

/// Split a comma-separated list param, dropping empty entries
pub(crate) fn csv_param(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// GET /api/dashboard — month-to-date KPIs by default, filterable by
/// date range, sources, and consultants
pub async fn general(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<DashboardParams>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);

    let start_date = parse_date_or(params.start_date.as_deref(), month_start);
    let end_date = parse_date_or(params.end_date.as_deref(), today);
    let sources = csv_param(params.sources.as_deref());
    let consultant_ids: Vec<i64> = csv_param(params.consultants.as_deref())
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let filter = SalesFilter {
        start_date: Some(start_date.to_string()),
        end_date: Some(end_date.to_string()),
        sources: sources.clone(),
        consultant_ids: consultant_ids.clone(),
    };

    let sales = SaleRepository::new(pool);
    let totals = sales.kpi_totals(&filter).await?;
    let margin = kpi::margin_pct(totals.revenue_net, totals.revenue_gross);

    // Commission applies each source's rule percentage to its net revenue
    let by_source = sales.revenue_by_source(&filter).await?;
    let rules: HashMap<String, Decimal> = CommissionRuleRepository::new(pool)
        .percentage_by_source()
        .await?
        .into_iter()
        .map(|(source, pct)| (source, Decimal::from_str(&pct).unwrap_or_default()))
        .collect();
    let net_by_source: Vec<(String, Decimal)> = by_source
        .iter()
        .map(|s| (s.source.clone(), s.revenue_net))
        .collect();
    let commission = kpi::commission_total(&net_by_source, &rules);

    // Trend line always spans the trailing 12 months, same source/consultant filters
    let trend_filter = SalesFilter {
        start_date: Some((today - Duration::days(365)).to_string()),
        end_date: None,
        sources: sources.clone(),
        consultant_ids: consultant_ids.clone(),
    };
    let trend = sales.monthly_trend(&trend_filter).await?;

    let top_clients = sales.client_performance(&filter, false, 5).await?;
    let bottom_clients = sales.client_performance(&filter, true, 5).await?;

    let all_sources = sales.distinct_sources().await?;
    let all_consultants: Vec<Value> = UserRepository::new(pool)
        .list_consultants(None)
        .await?
        .into_iter()
        .map(|u| {
            json!({
                "id": u.id,
                "name": format!("{} {}", u.first_name, u.last_name).trim().to_string(),
                "email": u.email,
            })
        })
        .collect();

    Ok(Json(json!({
        "kpis": {
            "tpv": totals.revenue_gross,
            "revenue_net": totals.revenue_net,
            "margin_pct": margin,
            "commission": commission,
            "sale_count": totals.sale_count,
        },
        "pie_chart": by_source,
        "line_chart": trend,
        "top_clients": top_clients,
        "bottom_clients": bottom_clients,
        "filters": {
            "start_date": start_date.to_string(),
            "end_date": end_date.to_string(),
            "sources": sources,
            "consultants": consultant_ids,
            "all_sources": all_sources,
            "all_consultants": all_consultants,
        },
    })))
}
