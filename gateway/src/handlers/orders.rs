use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use veloz_auth::extractors::AuthContext;
use veloz_auth::rbac::Permission;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::handlers::require_permission;
use crate::AppState;

static CLIENT_ORDER_COUNTER: AtomicU64 = AtomicU64::new(1);

fn generate_client_order_id() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_nanos();
    let seq = CLIENT_ORDER_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("cli-{now:x}-{seq}")
}

#[derive(Deserialize)]
pub struct SubmitOrderRequest {
    side: String,
    symbol: String,
    qty: f64,
    price: Option<f64>,
    client_order_id: Option<String>,
}

pub async fn list_orders(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadOrders)?;
    Ok(success(state.bridge.state().orders().await))
}

pub async fn get_order(State(state): State<AppState>, AuthContext(info): AuthContext, Path(id): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::ReadOrders)?;
    match state.bridge.state().order(&id).await {
        Some(order) => Ok(success(order)),
        None => Err(GatewayError::NotFound),
    }
}

pub async fn submit_order(
    State(state): State<AppState>,
    AuthContext(info): AuthContext,
    axum::Json(body): axum::Json<SubmitOrderRequest>,
) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::WriteOrders)?;

    if body.qty <= 0.0 {
        return Err(GatewayError::InvalidInput("qty must be positive".to_string()));
    }
    let side = body.side.to_lowercase();
    if side != "buy" && side != "sell" {
        return Err(GatewayError::InvalidInput("side must be buy or sell".to_string()));
    }

    let client_order_id = body.client_order_id.unwrap_or_else(generate_client_order_id);
    let params = json!({
        "side": side,
        "symbol": body.symbol,
        "qty": body.qty,
        "price": body.price,
        "client_order_id": client_order_id,
    });

    let reply = state
        .bridge
        .request("place_order", params)
        .await
        .map_err(|_| GatewayError::EngineUnavailable)?;

    Ok(success(reply))
}

pub async fn cancel_order(State(state): State<AppState>, AuthContext(info): AuthContext, Path(id): Path<String>) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::WriteCancel)?;
    let reply = state
        .bridge
        .request("cancel_order", json!({ "client_order_id": id }))
        .await
        .map_err(|_| GatewayError::EngineUnavailable)?;
    Ok(success(reply))
}

#[derive(Deserialize)]
pub struct BulkCancelRequest {
    order_ids: Vec<String>,
}

pub async fn bulk_cancel(
    State(state): State<AppState>,
    AuthContext(info): AuthContext,
    axum::Json(body): axum::Json<BulkCancelRequest>,
) -> GatewayResult<impl IntoResponse> {
    require_permission(&state.rbac, &info, Permission::WriteCancel)?;

    let mut results = Vec::with_capacity(body.order_ids.len());
    for order_id in &body.order_ids {
        let outcome = state.bridge.request("cancel_order", json!({ "client_order_id": order_id })).await;
        results.push(match outcome {
            Ok(payload) => json!({ "client_order_id": order_id, "status": "cancel_requested", "reply": payload }),
            Err(_) => json!({ "client_order_id": order_id, "status": "failed" }),
        });
    }
    Ok(success(json!({ "results": results })))
}
