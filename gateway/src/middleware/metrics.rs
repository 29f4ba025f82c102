use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// Fourth link in the chain. Error responses carry an `X-Error-Code` header
/// set by `GatewayError`'s `IntoResponse` impl; this reads it back rather
/// than re-deriving a code from the status line.
pub async fn metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if response.status().as_u16() >= 400 {
        let code = response
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        state.metrics.record_http_error(&code);
    }

    response
}
