use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use veloz_auth::extractors::AuthContext;
use veloz_auth::rbac::Permission;
use veloz_auth::JwtManager;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::handlers::require_permission;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    user_id: String,
    password: String,
}

/// Single built-in account: only `admin`, checked against
/// `VELOZ_ADMIN_PASSWORD`. General users authenticate via API key or a
/// token issued out-of-band; there is no general user/password directory.
pub async fn login(State(state): State<AppState>, axum::Json(body): axum::Json<LoginRequest>) -> GatewayResult<impl IntoResponse> {
    let Some(expected) = state.config.admin_password.as_deref() else {
        return Err(GatewayError::Unauthenticated);
    };
    if body.user_id != "admin" || body.password != expected {
        return Err(GatewayError::Unauthenticated);
    }

    let access_token = state.jwt.create_access_token("admin", None);
    let refresh_token = state.jwt.create_refresh_token("admin");
    Ok(success(json!({ "access_token": access_token, "refresh_token": refresh_token })))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

pub async fn refresh(State(state): State<AppState>, axum::Json(body): axum::Json<RefreshRequest>) -> GatewayResult<impl IntoResponse> {
    let info = state.jwt.verify_refresh_token(&body.refresh_token).ok_or(GatewayError::Unauthenticated)?;
    let access_token = state.jwt.create_access_token(&info.user_id, None);
    Ok(success(json!({ "access_token": access_token })))
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    refresh_token: String,
}

pub async fn logout(State(state): State<AppState>, axum::Json(body): axum::Json<LogoutRequest>) -> GatewayResult<impl IntoResponse> {
    if let Some(jti) = JwtManager::extract_jti(&body.refresh_token) {
        state.jwt.revoke_refresh_token(&jti);
    }
    Ok(success(json!({ "revoked": true })))
}

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

pub async fn list_keys(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::AdminKeys)?;
    let keys: Vec<_> = state
        .api_keys
        .list(&info.user_id)
        .into_iter()
        .map(|k| json!({
            "key_id": k.key_id,
            "name": k.name,
            "permissions": k.permissions,
            "created_at": k.created_at,
            "last_used_at": k.last_used_at,
            "revoked": k.revoked,
        }))
        .collect();
    Ok(success(json!({ "keys": keys })))
}

pub async fn create_key(
    State(state): State<AppState>,
    AuthContext(info): AuthContext,
    axum::Json(body): axum::Json<CreateKeyRequest>,
) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::AdminKeys)?;
    let permissions = body.permissions.into_iter().collect();
    let (key_id, raw_key) = state
        .api_keys
        .create(&info.user_id, &body.name, permissions)
        .map_err(|err| GatewayError::Internal(err.to_string()))?;
    Ok(success(json!({ "key_id": key_id, "raw_key": raw_key })))
}

pub async fn revoke_key(State(state): State<AppState>, AuthContext(info): AuthContext, Path(key_id): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::AdminKeys)?;
    if !state.api_keys.revoke(&key_id) {
        return Err(GatewayError::NotFound);
    }
    Ok(success(json!({ "revoked": true })))
}
