use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use veloz_auth::extractors::AuthContext;
use veloz_auth::rbac::Permission;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::handlers::require_permission;
use crate::AppState;

#[derive(Deserialize)]
pub struct MarketQuery {
    symbol: Option<String>,
}

pub async fn market(State(state): State<AppState>, AuthContext(info): AuthContext, Query(query): Query<MarketQuery>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadMarket)?;

    let reply = state
        .bridge
        .request("market_data", json!({ "symbol": query.symbol }))
        .await
        .map_err(|_| GatewayError::EngineUnavailable)?;

    Ok(success(reply))
}
