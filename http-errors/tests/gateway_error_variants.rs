use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use veloz_http_errors::GatewayError;

#[tokio::test]
async fn invalid_input_renders_400_with_code() {
    let err = GatewayError::InvalidInput("quantity must be positive".to_string());
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_input");
}

#[tokio::test]
async fn unauthenticated_renders_401() {
    let err = GatewayError::Unauthenticated;
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "unauthenticated");
}

#[tokio::test]
async fn not_found_renders_404() {
    let err = GatewayError::NotFound;
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_found");
}

#[tokio::test]
async fn engine_unavailable_renders_503() {
    let err = GatewayError::EngineUnavailable;
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "engine_unavailable");
}

#[tokio::test]
async fn internal_renders_500_with_message_body() {
    let err = GatewayError::Internal("bridge pipe closed".to_string());
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "internal");
    assert_eq!(json["message"], "bridge pipe closed");
}

#[tokio::test]
async fn permission_denied_renders_403_unauthorized() {
    let err = GatewayError::permission_denied("write_orders");
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "unauthorized");
}
