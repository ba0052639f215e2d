//! Login, refresh, and logout

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use persistence::repository::{AuditRepository, SessionRepository, UserRepository};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth;
use crate::error::{AppError, AppResult};
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();

    let user = UserRepository::new(pool)
        .get_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if user.is_active == 0 {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    let valid = auth::verify_password(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {e}")))?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid email or password".to_string()));
    }

    let access_token = auth::generate_access_token(user.id, &user.role, &state.jwt)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))?;

    let (refresh_token, refresh_hash) = auth::generate_refresh_token();
    let now = Utc::now().timestamp();
    let sessions = SessionRepository::new(pool);
    sessions
        .create(user.id, &refresh_hash, now + state.jwt.refresh_token_expiry_days * 86_400)
        .await?;
    // Opportunistic cleanup of stale sessions
    sessions.purge_expired(now).await?;

    AuditRepository::new(pool)
        .write(Some(user.id), "login_success", &json!({ "email": user.email }))
        .await?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "user": {
            "id": user.id,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "role": user.role,
        },
    })))
}

/// POST /api/auth/refresh — exchange a valid refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();
    let now = Utc::now().timestamp();

    let session = SessionRepository::new(pool)
        .find_valid(&auth::hash_refresh_token(&req.refresh_token), now)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    let user = UserRepository::new(pool)
        .get(session.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if user.is_active == 0 {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    let access_token = auth::generate_access_token(user.id, &user.role, &state.jwt)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))?;

    Ok(Json(json!({ "access_token": access_token })))
}

/// POST /api/auth/logout — revoke the session and record the action
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.db.pool();

    SessionRepository::new(pool)
        .delete_by_hash(&auth::hash_refresh_token(&req.refresh_token))
        .await?;

    AuditRepository::new(pool)
        .write(Some(user.user_id), "logout", &json!({}))
        .await?;

    Ok(Json(json!({ "success": true })))
}
