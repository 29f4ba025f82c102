//! Chooses which credential a request presents and calls the matching
//! verifier. Modeled as a sum type built once from headers, then a single
//! match, per the re-architecture note against the source's flat
//! if/else-if chain.

use axum::http::HeaderMap;

use crate::api_key::ApiKeyStore;
use crate::auth_info::{AuthInfo, AuthMethod};
use crate::jwt::JwtManager;

#[derive(Debug, PartialEq, Eq)]
pub enum Credential<'a> {
    ApiKey(&'a str),
    Jwt(&'a str),
    None,
}

pub fn extract_credential(headers: &HeaderMap) -> Credential<'_> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Credential::ApiKey(value);
        }
    }
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Credential::Jwt(token.trim());
        }
    }
    Credential::None
}

pub struct AuthCoordinator<'a> {
    pub api_keys: &'a ApiKeyStore,
    pub jwt: &'a JwtManager,
}

impl<'a> AuthCoordinator<'a> {
    pub fn new(api_keys: &'a ApiKeyStore, jwt: &'a JwtManager) -> Self {
        Self { api_keys, jwt }
    }

    /// API key beats JWT, and API-key failure is terminal: a request that
    /// presents a bad `X-API-Key` never falls back to a valid bearer token.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<AuthInfo> {
        match extract_credential(headers) {
            Credential::ApiKey(raw) => self.api_keys.validate(raw),
            Credential::Jwt(token) => {
                let info = self.jwt.verify_access_token(token)?;
                Some(AuthInfo {
                    user_id: info.user_id,
                    auth_method: AuthMethod::Jwt,
                    api_key_id: info.api_key_id,
                    permissions: Default::default(),
                })
            }
            Credential::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::collections::BTreeSet;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn api_key_failure_is_terminal_even_with_valid_bearer() {
        let api_keys = ApiKeyStore::new();
        let jwt = JwtManager::new(b"a-secret-that-is-at-least-32-bytes!".to_vec(), None, 3600, 604800);
        let token = jwt.create_access_token("trader-1", None);
        let h = headers(&[("x-api-key", "not-a-real-key"), ("authorization", &format!("Bearer {token}"))]);
        let coordinator = AuthCoordinator::new(&api_keys, &jwt);
        assert!(coordinator.authenticate(&h).is_none());
    }

    #[test]
    fn falls_back_to_jwt_when_no_api_key_header() {
        let api_keys = ApiKeyStore::new();
        let jwt = JwtManager::new(b"a-secret-that-is-at-least-32-bytes!".to_vec(), None, 3600, 604800);
        let token = jwt.create_access_token("trader-1", None);
        let h = headers(&[("authorization", &format!("Bearer {token}"))]);
        let coordinator = AuthCoordinator::new(&api_keys, &jwt);
        let info = coordinator.authenticate(&h).expect("jwt auth succeeds");
        assert_eq!(info.auth_method, AuthMethod::Jwt);
        assert_eq!(info.user_id, "trader-1");
    }

    #[test]
    fn valid_api_key_wins_over_bearer() {
        let api_keys = ApiKeyStore::new();
        let (_, raw_key) = api_keys.create("u1", "k", BTreeSet::new()).unwrap();
        let jwt = JwtManager::new(b"a-secret-that-is-at-least-32-bytes!".to_vec(), None, 3600, 604800);
        let token = jwt.create_access_token("someone-else", None);
        let h = headers(&[("x-api-key", &raw_key), ("authorization", &format!("Bearer {token}"))]);
        let coordinator = AuthCoordinator::new(&api_keys, &jwt);
        let info = coordinator.authenticate(&h).expect("api key auth succeeds");
        assert_eq!(info.auth_method, AuthMethod::ApiKey);
        assert_eq!(info.user_id, "u1");
    }
}
