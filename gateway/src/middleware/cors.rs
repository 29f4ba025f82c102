use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;

/// Third link in the chain. Answers `OPTIONS` preflight directly without
/// reaching the handler, and stamps the allow-origin header on every other
/// response regardless of outcome so error responses remain browser-usable.
pub async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = HeaderValue::from_str(&state.config.cors_origin).unwrap_or_else(|_| HeaderValue::from_static("*"));

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert("Access-Control-Allow-Origin", origin);
        headers.insert("Access-Control-Allow-Methods", HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"));
        headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("Content-Type, Authorization, X-API-Key, Last-Event-ID"));
        headers.insert("Access-Control-Max-Age", HeaderValue::from_static("600"));
        return response;
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert("Access-Control-Allow-Origin", origin);
    response
}
