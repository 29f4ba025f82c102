use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth_info::AuthInfo;
use crate::error::AuthError;

/// Pulls the `AuthInfo` the auth middleware attached to the request via
/// `Extensions`. Handlers that require authentication take this as an
/// extractor argument instead of re-deriving identity from headers.
pub struct AuthContext(pub AuthInfo);

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthInfo>().cloned().map(AuthContext).ok_or(AuthError::Missing)
    }
}
