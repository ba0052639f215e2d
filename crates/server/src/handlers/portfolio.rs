//! Role-scoped "my book" view: own/team KPIs, goals, and client performance
//!
//! Consultants see their own sales and clients, managers see their team's,
//! admins see everything. Goal KPIs use the month of the filter's start date.

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use ingest::{kpi, Role};
use persistence::repository::{
    ClientRepository, GoalRepository, SaleRepository, SalesFilter, UserRepository,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::AppResult;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Deserialize)]
pub struct PortfolioParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_date_or(value: Option<&str>, default: NaiveDate) -> NaiveDate {
    value
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or(default)
}

/// GET /api/portfolio
pub async fn portfolio(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PortfolioParams>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);

    let start_date = parse_date_or(params.start_date.as_deref(), month_start);
    let end_date = parse_date_or(params.end_date.as_deref(), today);

    // Goal KPIs are anchored to the filter's start month, not today
    let goal_year = start_date.year();
    let goal_month = start_date.month();

    let users = UserRepository::new(pool);

    // None = unrestricted (admin); Some(ids) = restricted to these consultants
    let scope: Option<Vec<i64>> = match user.role {
        Role::Consultant => Some(vec![user.user_id]),
        Role::Manager => Some(users.team_ids(user.user_id).await?),
        Role::Admin => None,
    };

    // A manager with no team has an empty book
    if matches!(&scope, Some(ids) if ids.is_empty()) {
        return Ok(Json(empty_portfolio(start_date, end_date)));
    }
    let scope_ids = scope.unwrap_or_default();

    let sales = SaleRepository::new(pool);
    let filter = SalesFilter {
        start_date: Some(start_date.to_string()),
        end_date: Some(end_date.to_string()),
        sources: Vec::new(),
        consultant_ids: scope_ids.clone(),
    };

    let totals = sales.kpi_totals(&filter).await?;
    let clients_activated = sales.active_client_count(&filter).await?;
    let total_clients = ClientRepository::new(pool).count_for(&scope_ids).await?;

    // Goal attainment for the selected month
    let month_revenue = sales
        .month_net_total(&scope_ids, goal_year, goal_month)
        .await?;
    let month_target = GoalRepository::new(pool)
        .sum_for_month(&scope_ids, goal_year, goal_month)
        .await?;
    let attainment = kpi::attainment_pct(month_revenue, month_target);

    let book = sales
        .book_performance(&scope_ids, &start_date.to_string(), &end_date.to_string())
        .await?;

    // Per-consultant roll-up for managers
    let team_performance = if user.role == Role::Manager {
        team_rollup(&state, user.user_id, &scope_ids, goal_year, goal_month).await?
    } else {
        Vec::new()
    };

    let trend_filter = SalesFilter {
        start_date: Some((today - Duration::days(365)).to_string()),
        end_date: None,
        sources: Vec::new(),
        consultant_ids: scope_ids,
    };
    let trend = sales.monthly_trend(&trend_filter).await?;

    Ok(Json(json!({
        "kpis": {
            "revenue_net": totals.revenue_net,
            "sale_count": totals.sale_count,
            "clients_activated": clients_activated,
            "total_clients": total_clients,
            "month_revenue": month_revenue,
            "month_target": month_target,
            "attainment_pct": attainment,
        },
        "goal_period": { "year": goal_year, "month": goal_month },
        "clients": book,
        "team_performance": team_performance,
        "line_chart": trend,
        "filters": {
            "start_date": start_date.to_string(),
            "end_date": end_date.to_string(),
        },
    })))
}

/// Revenue vs goal for each consultant of a manager's team, best first
async fn team_rollup(
    state: &AppState,
    manager_id: i64,
    team_ids: &[i64],
    year: i32,
    month: u32,
) -> AppResult<Vec<Value>> {
    let pool = state.db.pool();

    let consultants = UserRepository::new(pool)
        .list_consultants(Some(manager_id))
        .await?;
    let revenue: std::collections::HashMap<i64, Decimal> = SaleRepository::new(pool)
        .month_net_by_consultant(team_ids, year, month)
        .await?
        .into_iter()
        .collect();
    let goals: std::collections::HashMap<i64, Decimal> = GoalRepository::new(pool)
        .for_month(team_ids, year, month)
        .await?
        .into_iter()
        .map(|g| {
            (
                g.user_id,
                Decimal::from_str(&g.target_value).unwrap_or_default(),
            )
        })
        .collect();

    let mut rows: Vec<(Decimal, Value)> = consultants
        .into_iter()
        .map(|c| {
            let rev = revenue.get(&c.id).copied().unwrap_or_default();
            let goal = goals.get(&c.id).copied().unwrap_or_default();
            let row = json!({
                "consultant_id": c.id,
                "name": format!("{} {}", c.first_name, c.last_name).trim().to_string(),
                "email": c.email,
                "revenue_month": rev,
                "goal_month": goal,
                "attainment_pct": kpi::attainment_pct(rev, goal),
            });
            (rev, row)
        })
        .collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

fn empty_portfolio(start_date: NaiveDate, end_date: NaiveDate) -> Value {
    json!({
        "kpis": {
            "revenue_net": Decimal::ZERO,
            "sale_count": 0,
            "clients_activated": 0,
            "total_clients": 0,
            "month_revenue": Decimal::ZERO,
            "month_target": Decimal::ZERO,
            "attainment_pct": Decimal::ZERO,
        },
        "goal_period": { "year": start_date.year(), "month": start_date.month() },
        "clients": [],
        "team_performance": [],
        "line_chart": [],
        "filters": {
            "start_date": start_date.to_string(),
            "end_date": end_date.to_string(),
        },
    })
}
