use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use veloz_auth::{AuthInfo, AuthMethod};
use veloz_http_errors::GatewayError;

use crate::middleware::client_ip;
use crate::AppState;

/// Second link in the chain. Identity is the authenticated user id when
/// auth produced one, falling back to client IP for anonymous/public
/// routes — so health checks and login attempts are still throttled.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, GatewayError> {
    let identity = request
        .extensions()
        .get::<AuthInfo>()
        .filter(|info| info.auth_method != AuthMethod::Disabled)
        .map(|info| info.user_id.clone())
        .unwrap_or_else(|| client_ip(&request));

    state.metrics.rate_checks_total.inc();
    let decision = state.rate_limiter.check(&identity).await;

    if !decision.allowed {
        state.metrics.rate_rejections_total.inc();
        return Err(GatewayError::RateLimited { retry_after_secs: decision.retry_after_secs });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&decision.remaining.to_string()).expect("decimal formats to valid header value"),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&decision.reset_at.to_string()).expect("decimal formats to valid header value"),
    );
    Ok(response)
}
