//! Goal management: one revenue target per (consultant, year, month)
//!
//! Admins manage every consultant's goals; managers only their own team's.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{Datelike, Utc};
use ingest::Role;
use persistence::repository::{GoalRepository, UserRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::extract::RequireManager;
use crate::AppState;

#[derive(Deserialize)]
pub struct GoalPeriodParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Deserialize)]
pub struct GoalTarget {
    pub user_id: i64,
    pub target_value: String,
}

#[derive(Deserialize)]
pub struct SaveGoalsRequest {
    pub year: i32,
    pub month: u32,
    pub targets: Vec<GoalTarget>,
}

/// GET /api/goals?year=&month= — each consultant in scope with the
/// period's target (if any)
pub async fn list(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Query(params): Query<GoalPeriodParams>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let today = Utc::now().date_naive();
    let year = params.year.unwrap_or_else(|| today.year());
    let month = params.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::BadRequest(format!("Invalid month {month}")));
    }

    let manager_scope = (user.role == Role::Manager).then_some(user.user_id);
    let consultants = UserRepository::new(pool)
        .list_consultants(manager_scope)
        .await?;

    let ids: Vec<i64> = consultants.iter().map(|c| c.id).collect();
    let goals = GoalRepository::new(pool).for_month(&ids, year, month).await?;
    let by_user: HashMap<i64, (i64, String)> = goals
        .into_iter()
        .map(|g| (g.user_id, (g.id, g.target_value)))
        .collect();

    let rows: Vec<Value> = consultants
        .into_iter()
        .map(|c| {
            let (goal_id, target) = by_user
                .get(&c.id)
                .map(|(id, t)| (Some(*id), t.clone()))
                .unwrap_or((None, "0".to_string()));
            json!({
                "consultant_id": c.id,
                "name": format!("{} {}", c.first_name, c.last_name).trim().to_string(),
                "email": c.email,
                "goal_id": goal_id,
                "target_value": target,
            })
        })
        .collect();

    Ok(Json(json!({
        "year": year,
        "month": month,
        "consultants": rows,
    })))
}

/// PUT /api/goals — upsert a batch of targets for one month.
/// Targets for consultants outside the caller's scope are skipped.
pub async fn save(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Json(req): Json<SaveGoalsRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    if !(1..=12).contains(&req.month) {
        return Err(AppError::BadRequest(format!("Invalid month {}", req.month)));
    }

    let users = UserRepository::new(pool);
    let goals = GoalRepository::new(pool);
    let mut saved = 0;

    for target in &req.targets {
        let value = if target.target_value.trim().is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_str(target.target_value.trim()).map_err(|_| {
                AppError::BadRequest(format!(
                    "Invalid target '{}' for user {}",
                    target.target_value, target.user_id
                ))
            })?
        };

        // Ownership: managers may only set goals for their own team
        let allowed = match users.get(target.user_id).await? {
            Some(u) if user.role == Role::Admin => u.role == "consultant",
            Some(u) => u.role == "consultant" && u.manager_id == Some(user.user_id),
            None => false,
        };
        if !allowed {
            continue;
        }

        goals
            .upsert(target.user_id, req.year, req.month, &value)
            .await?;
        saved += 1;
    }

    Ok(Json(json!({
        "success": true,
        "saved": saved,
        "year": req.year,
        "month": req.month,
    })))
}

/// DELETE /api/goals/{id}
pub async fn remove(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(goal_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let goals = GoalRepository::new(pool);

    let goal = goals
        .get(goal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goal {goal_id} not found")))?;

    // Managers can only delete goals belonging to their own team
    if user.role == Role::Manager {
        let owner = UserRepository::new(pool).get(goal.user_id).await?;
        if owner.and_then(|u| u.manager_id) != Some(user.user_id) {
            return Err(AppError::Forbidden(
                "Goal belongs to another manager's team".to_string(),
            ));
        }
    }

    goals.delete(goal_id).await?;

    Ok(Json(json!({
        "success": true,
        "year": goal.year,
        "month": goal.month,
    })))
}
