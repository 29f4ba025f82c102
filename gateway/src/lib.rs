pub mod app_state;
pub mod bridge;
pub mod config;
pub mod config_store;
pub mod handlers;
pub mod middleware;
pub mod rate_limiter;
pub mod sse;

pub use crate::app_state::AppState;
pub use crate::config::GatewayConfig;
pub use crate::rate_limiter::RateLimiter;

use axum::routing::{delete, get, post};
use axum::Router;

/// Assembles the full route table from spec §6. Middleware is layered
/// separately by the caller (auth → rate-limit → cors → metrics → audit is
/// a property of `.layer()` call order, not of this function).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::simple_health))
        .route("/api/health", get(handlers::health::detailed_health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/keys", get(handlers::auth::list_keys).post(handlers::auth::create_key))
        .route("/api/auth/keys/:id", delete(handlers::auth::revoke_key))
        .route("/api/orders", get(handlers::orders::list_orders).post(handlers::orders::submit_order))
        .route("/api/orders/:id", get(handlers::orders::get_order).delete(handlers::orders::cancel_order))
        .route("/api/cancel", post(handlers::orders::bulk_cancel))
        .route("/api/account", get(handlers::account::account))
        .route("/api/account/positions", get(handlers::account::positions))
        .route("/api/account/positions/:symbol", get(handlers::account::position))
        .route("/api/config", get(handlers::config::get_all))
        .route("/api/config/:key", get(handlers::config::get_one).post(handlers::config::set_one).delete(handlers::config::delete_one))
        .route("/api/market", get(handlers::market::market))
        .route("/api/stream", get(sse::handler::stream))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

async fn metrics_endpoint(axum::extract::State(state): axum::extract::State<AppState>) -> axum::response::Response {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [("Content-Type", "text/plain; version=0.0.4")], body).into_response(),
        Err(err) => {
            tracing::warn!(%err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
