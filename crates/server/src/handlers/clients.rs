//! Orphan-sale listing and client assignment

use axum::extract::State;
use axum::response::Json;
use ingest::normalize::clean_cnpj;
use persistence::repository::{ClientRepository, SaleRepository, UserRepository};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::extract::RequireManager;
use crate::AppState;

#[derive(Deserialize)]
pub struct AssignRequest {
    pub cnpj: String,
    pub consultant_id: i64,
    pub client_name: String,
}

/// GET /api/clients/orphans — unattributed sales grouped by raw CNPJ,
/// plus the consultant list for the assignment form
pub async fn orphans(
    State(state): State<AppState>,
    RequireManager(_user): RequireManager,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();

    let groups = SaleRepository::new(pool).orphan_groups().await?;
    let consultants: Vec<Value> = UserRepository::new(pool)
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
        "orphans": groups,
        "consultants": consultants,
    })))
}

/// POST /api/clients/assign — upsert the client under the chosen consultant
/// and attribute every matching orphan sale, backfilling the manager
pub async fn assign(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Json(req): Json<AssignRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();

    let cnpj = clean_cnpj(&req.cnpj)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid CNPJ '{}'", req.cnpj)))?;

    let consultant = UserRepository::new(pool)
        .get(req.consultant_id)
        .await?
        .filter(|u| u.role == "consultant")
        .ok_or_else(|| AppError::BadRequest("Consultant not found".to_string()))?;

    let manager_id = consultant.manager_id;

    ClientRepository::new(pool)
        .upsert(&cnpj, &req.client_name, Some(consultant.id), manager_id)
        .await?;

    let assigned = SaleRepository::new(pool)
        .assign_orphans(&cnpj, consultant.id, manager_id)
        .await?;

    info!(
        by = user.user_id,
        cnpj = %cnpj,
        consultant_id = consultant.id,
        assigned,
        "Client assigned"
    );

    Ok(Json(json!({
        "success": true,
        "cnpj": cnpj,
        "sales_assigned": assigned,
        "message": format!(
            "Client {} assigned to {} {}",
            req.client_name, consultant.first_name, consultant.last_name
        ),
    })))
}
