//! Commission rule CRUD (admin only), each mutation audit-logged

use axum::extract::{Path, State};
use axum::response::Json;
use persistence::repository::{AuditRepository, CommissionRuleRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::extract::RequireAdmin;
use crate::AppState;

#[derive(Deserialize)]
pub struct RuleRequest {
    pub rule_name: String,
    pub source: String,
    pub percentage: String,
}

/// Percentage must be a decimal between 0 and 100
fn parse_percentage(raw: &str) -> AppResult<Decimal> {
    let pct = Decimal::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid percentage '{raw}'")))?;
    if pct < Decimal::ZERO || pct > Decimal::from(100) {
        return Err(AppError::BadRequest(format!(
            "Percentage {pct} out of range (0-100)"
        )));
    }
    Ok(pct)
}

/// GET /api/commission-rules
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<Value>> {
    let rules = CommissionRuleRepository::new(state.db.pool()).list().await?;
    Ok(Json(json!({ "rules": rules })))
}

/// POST /api/commission-rules
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<RuleRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let pct = parse_percentage(&req.percentage)?;

    let id = CommissionRuleRepository::new(pool)
        .create(&req.rule_name, &req.source, &pct.to_string())
        .await?;

    AuditRepository::new(pool)
        .write(
            Some(admin.user_id),
            "commission_rule_created",
            &json!({
                "rule_id": id,
                "rule_name": req.rule_name,
                "source": req.source,
                "percentage": pct,
            }),
        )
        .await?;

    Ok(Json(json!({ "success": true, "id": id })))
}

/// PUT /api/commission-rules/{id} — audit entry records the old/new change set
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(req): Json<RuleRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let repo = CommissionRuleRepository::new(pool);

    let old = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Commission rule {id} not found")))?;
    let pct = parse_percentage(&req.percentage)?;

    repo.update(id, &req.rule_name, &req.source, &pct.to_string())
        .await?;

    AuditRepository::new(pool)
        .write(
            Some(admin.user_id),
            "commission_rule_updated",
            &json!({
                "rule_id": id,
                "rule_name": req.rule_name,
                "changes": {
                    "old": {
                        "rule_name": old.rule_name,
                        "source": old.source,
                        "percentage": old.percentage,
                    },
                    "new": {
                        "rule_name": req.rule_name,
                        "source": req.source,
                        "percentage": pct,
                    },
                },
            }),
        )
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/commission-rules/{id}
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let repo = CommissionRuleRepository::new(pool);

    let rule = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Commission rule {id} not found")))?;

    repo.delete(id).await?;

    AuditRepository::new(pool)
        .write(
            Some(admin.user_id),
            "commission_rule_deleted",
            &json!({
                "rule_id": id,
                "rule_name": rule.rule_name,
                "source": rule.source,
                "percentage": rule.percentage,
            }),
        )
        .await?;

    Ok(Json(json!({ "success": true })))
}
