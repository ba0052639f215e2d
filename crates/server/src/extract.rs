//! Authentication and role-gating extractors
//!
//! [`AuthUser`] pulls the caller's identity from the `Authorization` bearer
//! token; the `Require*` wrappers reject callers whose role is not on the
//! allow-list before the handler body runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ingest::Role;

use crate::auth::validate_token;
use crate::error::AppError;
use crate::AppState;

/// Authenticated caller extracted from a JWT bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

/// Check a caller's role against an allow-list
pub fn require_role(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' is not allowed to perform this action",
            user.role
        )))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".to_string())
        })?;

        let claims = validate_token(token, &state.jwt)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown role '{}'", claims.role)))?;

        Ok(AuthUser {
            user_id: claims.sub,
            role,
        })
    }
}

/// Requires the admin role. Rejects with 403 otherwise.
pub struct RequireAdmin(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, &[Role::Admin])?;
        Ok(RequireAdmin(user))
    }
}

/// Requires manager or admin role. Rejects with 403 otherwise.
pub struct RequireManager(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireManager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, &[Role::Admin, Role::Manager])?;
        Ok(RequireManager(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser { user_id: 1, role }
    }

    #[test]
    fn test_consultant_denied_admin_action() {
        let result = require_role(&user(Role::Consultant), &[Role::Admin]);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_admin_allowed_admin_action() {
        assert!(require_role(&user(Role::Admin), &[Role::Admin]).is_ok());
    }

    #[test]
    fn test_manager_allowed_on_manager_list() {
        assert!(require_role(&user(Role::Manager), &[Role::Admin, Role::Manager]).is_ok());
        assert!(require_role(&user(Role::Consultant), &[Role::Admin, Role::Manager]).is_err());
    }
}
