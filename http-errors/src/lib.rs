use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// The shared error taxonomy. Every layer (middleware, handler, bridge)
/// raises one of these kinds; each kind maps to exactly one status code.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Unauthorized(String),
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed { allow: String },
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("engine unavailable")]
    EngineUnavailable,
    #[error("internal error")]
    Internal(String),
}

impl GatewayError {
    pub fn permission_denied(permission: &str) -> Self {
        Self::Unauthorized(format!("Permission denied: {permission} required"))
    }

    fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::Unauthenticated => "unauthenticated",
            GatewayError::Unauthorized(_) => "unauthorized",
            GatewayError::NotFound => "not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::RateLimited { .. } => "rate_limit_exceeded",
            GatewayError::EngineUnavailable => "engine_unavailable",
            GatewayError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::Unauthorized(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();
        let mut response = (status, Json(ErrorBody { error: code, message })).into_response();

        if let Ok(val) = HeaderValue::from_str(code) {
            response.headers_mut().insert("X-Error-Code", val);
        }
        match &self {
            GatewayError::MethodNotAllowed { allow } => {
                if let Ok(val) = HeaderValue::from_str(allow) {
                    response.headers_mut().insert(axum::http::header::ALLOW, val);
                }
            }
            GatewayError::RateLimited { retry_after_secs } => {
                response.headers_mut().insert(
                    axum::http::header::RETRY_AFTER,
                    HeaderValue::from_str(&retry_after_secs.to_string()).expect("digits are valid header value"),
                );
            }
            _ => {}
        }
        response
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Envelope for successful handler responses: `{"status":"success","data":{...}}`.
#[derive(Serialize)]
pub struct SuccessBody<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<SuccessBody<T>> {
    Json(SuccessBody { status: "success", data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unauthorized_renders_403_with_message() {
        let err = GatewayError::permission_denied("read_orders");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
        assert_eq!(json["message"], "Permission denied: read_orders required");
    }

    #[tokio::test]
    async fn method_not_allowed_sets_allow_header() {
        let err = GatewayError::MethodNotAllowed { allow: "GET".to_string() };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get("allow").unwrap(), "GET");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let err = GatewayError::RateLimited { retry_after_secs: 5 };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "5");
    }
}
