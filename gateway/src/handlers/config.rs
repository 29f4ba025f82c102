use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde_json::Value;
use veloz_auth::extractors::AuthContext;
use veloz_auth::rbac::Permission;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::config_store::value_from_json;
use crate::handlers::require_permission;
use crate::AppState;

pub async fn get_all(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadConfig)?;
    Ok(success(state.config_store.all()))
}

pub async fn get_one(State(state): State<AppState>, AuthContext(info): AuthContext, Path(key): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadConfig)?;
    match state.config_store.get(&key) {
        Some(value) => Ok(success(value)),
        None => Err(GatewayError::NotFound),
    }
}

pub async fn set_one(
    State(state): State<AppState>,
    AuthContext(info): AuthContext,
    Path(key): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::AdminConfig)?;

    let value = value_from_json(&body).ok_or_else(|| GatewayError::InvalidInput("value must be a string, number, or bool".to_string()))?;
    if state.config_store.is_read_only(&key) {
        return Err(GatewayError::InvalidInput(format!("{key} is read-only")));
    }
    state.config_store.set(key, value);
    Ok(success(serde_json::json!({ "updated": true })))
}

pub async fn delete_one(State(state): State<AppState>, AuthContext(info): AuthContext, Path(key): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::AdminConfig)?;

    if state.config_store.is_read_only(&key) {
        return Err(GatewayError::InvalidInput(format!("{key} is read-only")));
    }
    if !state.config_store.remove(&key) {
        return Err(GatewayError::NotFound);
    }
    Ok(success(serde_json::json!({ "deleted": true })))
}
