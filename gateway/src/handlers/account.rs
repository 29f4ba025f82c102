use axum::extract::{Path, State};
use axum::response::IntoResponse;
use veloz_auth::extractors::AuthContext;
use veloz_auth::rbac::Permission;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::handlers::require_permission;
use crate::AppState;

pub async fn account(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadAccount)?;
    Ok(success(state.bridge.state().account().await))
}

pub async fn positions(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadAccount)?;
    Ok(success(state.bridge.state().positions().await))
}

pub async fn position(State(state): State<AppState>, AuthContext(info): AuthContext, Path(symbol): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadAccount)?;
    match state.bridge.state().position(&symbol).await {
        Some(position) => Ok(success(position)),
        None => Err(GatewayError::NotFound),
    }
}
