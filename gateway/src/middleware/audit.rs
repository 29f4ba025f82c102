use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use veloz_auth::AuthInfo;

use crate::middleware::client_ip;
use crate::AppState;

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_secs()
}

/// Last link before the handler. Runs after the response is produced so the
/// record can carry the outcome; logging itself never blocks the response
/// since `AuditLogger::log` only enqueues.
pub async fn audit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let ip = client_ip(&request);
    let user_id = request.extensions().get::<AuthInfo>().map(|info| info.user_id.clone());

    let response = next.run(request).await;

    state.audit.log(
        "http_request",
        format!("{method} {path}"),
        user_id,
        Some(ip),
        Some(json!({ "status": response.status().as_u16() })),
        now_secs(),
    );

    response
}
