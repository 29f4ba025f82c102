use std::collections::BTreeSet;

/// How the current request authenticated, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Jwt,
    ApiKey,
    Disabled,
}

/// Per-request authentication result. Built once by the auth coordinator and
/// carried through the middleware chain and into the handler; never shared
/// across requests.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: String,
    pub auth_method: AuthMethod,
    pub api_key_id: Option<String>,
    /// String-named permissions granted directly (API-key auth). JWT-authenticated
    /// requests carry an empty set here and defer to the RBAC role lookup instead.
    pub permissions: BTreeSet<String>,
}

impl AuthInfo {
    pub fn disabled() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            auth_method: AuthMethod::Disabled,
            api_key_id: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn has_permission_name(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}
