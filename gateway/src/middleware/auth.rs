use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use veloz_auth::coordinator::{extract_credential, Credential};
use veloz_auth::{AuthCoordinator, AuthInfo};
use veloz_http_errors::GatewayError;

use crate::AppState;

/// First link in the fixed middleware chain. Always runs: populates
/// `AuthInfo` for every request so downstream handlers can check
/// permissions, but only rejects outright when a credential was *presented*
/// and failed — absent credentials fall through as `AuthInfo::disabled()`
/// and let public routes (health, login, stream) proceed.
pub async fn auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, GatewayError> {
    if !state.config.auth_enabled {
        request.extensions_mut().insert(AuthInfo::disabled());
        return Ok(next.run(request).await);
    }

    let headers = request.headers().clone();
    let credential_present = !matches!(extract_credential(&headers), Credential::None);
    let coordinator = AuthCoordinator::new(&state.api_keys, &state.jwt);

    match coordinator.authenticate(&headers) {
        Some(info) => {
            request.extensions_mut().insert(info);
        }
        None if credential_present => return Err(GatewayError::Unauthenticated),
        None => {
            request.extensions_mut().insert(AuthInfo::disabled());
        }
    }

    Ok(next.run(request).await)
}
