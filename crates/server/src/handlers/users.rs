//! User account CRUD (admin only)

use axum::extract::{Path, State};
use axum::response::Json;
use ingest::Role;
use persistence::repository::{NewUser, UserRepository, UserUpdate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::error::{AppError, AppResult};
use crate::extract::RequireAdmin;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: String,
    pub manager_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: String,
    pub manager_id: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Optional password reset
    pub password: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Validate the role string and the manager link: only a manager-role
/// account can be pointed at as `manager_id`.
async fn validate_role_and_manager(
    repo: &UserRepository<'_>,
    role: &str,
    manager_id: Option<i64>,
) -> AppResult<()> {
    if Role::parse(role).is_none() {
        return Err(AppError::BadRequest(format!("Unknown role '{role}'")));
    }
    if let Some(mid) = manager_id {
        let manager = repo
            .get(mid)
            .await?
            .filter(|u| u.role == "manager")
            .is_some();
        if !manager {
            return Err(AppError::BadRequest(format!(
                "User {mid} is not a manager"
            )));
        }
    }
    Ok(())
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<Value>> {
    let users = UserRepository::new(state.db.pool()).list().await?;
    Ok(Json(json!({ "users": users })))
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let repo = UserRepository::new(pool);

    validate_role_and_manager(&repo, &req.role, req.manager_id).await?;
    auth::validate_password_strength(&req.password).map_err(AppError::BadRequest)?;

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;

    let id = repo
        .create(&NewUser {
            email: req.email.clone(),
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            manager_id: req.manager_id,
        })
        .await?;

    Ok(Json(json!({ "success": true, "id": id })))
}

/// PUT /api/users/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let repo = UserRepository::new(pool);

    repo.get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
    validate_role_and_manager(&repo, &req.role, req.manager_id).await?;

    repo.update(
        id,
        &UserUpdate {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            manager_id: req.manager_id,
            is_active: req.is_active,
        },
    )
    .await?;

    if let Some(password) = &req.password {
        auth::validate_password_strength(password).map_err(AppError::BadRequest)?;
        let hash = auth::hash_password(password)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;
        repo.set_password_hash(id, &hash).await?;
    }

    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/users/{id}
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if id == admin.user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let deleted = UserRepository::new(state.db.pool()).delete(id).await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("User {id} not found")));
    }

    Ok(Json(json!({ "success": true })))
}
