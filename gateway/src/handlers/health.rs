use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use veloz_auth::extractors::AuthContext;
use veloz_auth::AuthMethod;
use veloz_http_errors::{success, GatewayError, GatewayResult};

use crate::AppState;

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_secs()
}

/// Resident set size in MB, read from `/proc/self/status`. Returns `None`
/// on platforms without procfs rather than guessing.
fn memory_usage_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb as f64 / 1024.0)
}

pub async fn simple_health() -> impl IntoResponse {
    success(json!({ "status": "ok", "timestamp": now_secs() }))
}

pub async fn detailed_health(State(state): State<AppState>, AuthContext(info): AuthContext) -> GatewayResult<impl IntoResponse> {
    if info.auth_method == AuthMethod::Disabled {
        return Err(GatewayError::Unauthenticated);
    }

    Ok(success(json!({
        "status": "ok",
        "timestamp": now_secs(),
        "engine": {
            "connected": state.bridge.is_connected(),
            "pending_requests": state.bridge.pending_count(),
        },
        "memory_mb": memory_usage_mb(),
        "sse_active_streams": state.sse_active_streams.load(Ordering::Relaxed),
    })))
}
