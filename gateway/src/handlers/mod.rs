pub mod account;
pub mod auth;
pub mod config;
pub mod health;
pub mod market;
pub mod orders;

use veloz_auth::{has_permission, AuthInfo, Permission, RbacStore};
use veloz_http_errors::{GatewayError, GatewayResult};

/// Shared gate for every permission-bearing handler: string-named
/// permissions on the `AuthInfo` (API-key auth) or the RBAC role lookup
/// (JWT auth), per the auth coordinator's split.
pub fn require_permission(rbac: &RbacStore, info: &AuthInfo, permission: Permission) -> GatewayResult<()> {
    if has_permission(rbac, info, permission) {
        Ok(())
    } else {
        Err(GatewayError::permission_denied(permission.name()))
    }
}
