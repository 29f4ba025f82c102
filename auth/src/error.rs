use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Rejection reasons for the `AuthInfo` extractor. The server-wide error
/// taxonomy (see `veloz-http-errors`) collapses all of these to
/// `unauthenticated`; this type exists only so middleware and handlers can
/// log the specific reason.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no AuthInfo was populated for this request")]
    Missing,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Reached only if a handler uses the extractor on a route the auth
        // middleware did not run in front of — a wiring bug, not a client error.
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
