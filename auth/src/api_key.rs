//! API key issuance, hashed storage, validation, and revocation.
//!
//! Keys are stored by their SHA-256 hash, never in raw form; raw key
//! material is returned to the caller exactly once, at creation.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use veloz_crypto::{hex_decode_lower, hex_encode, random_bytes, sha256};

use crate::auth_info::{AuthInfo, AuthMethod};

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("internal error: SHA-256 hash collision observed during key creation")]
    HashCollision,
}

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub key_id: String,
    pub key_hash: [u8; 32],
    pub user_id: String,
    pub name: String,
    pub permissions: BTreeSet<String>,
    pub created_at: u64,
    pub last_used_at: Option<u64>,
    pub revoked: bool,
}

struct State {
    by_id: HashMap<String, ApiKey>,
    hash_to_id: HashMap<[u8; 32], String>,
    next_counter: u64,
}

pub struct ApiKeyStore {
    state: RwLock<State>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                by_id: HashMap::new(),
                hash_to_id: HashMap::new(),
                next_counter: 1,
            }),
        }
    }

    /// Generates 32 random bytes, hex-encodes them into the 64-character raw
    /// key, hashes that raw key with SHA-256, and stores the record keyed by
    /// hash. Returns `(key_id, raw_key)` — the only time the raw key is
    /// observable.
    pub fn create(&self, user_id: &str, name: &str, permissions: BTreeSet<String>) -> Result<(String, String), ApiKeyError> {
        let raw_bytes = random_bytes(32);
        let raw_key = hex_encode(&raw_bytes);
        let key_hash = sha256(raw_bytes.as_slice());

        let mut state = self.state.write().expect("api key store lock poisoned");
        if state.hash_to_id.contains_key(&key_hash) {
            return Err(ApiKeyError::HashCollision);
        }

        let key_id = loop {
            let candidate = hex_encode(&random_bytes(8));
            if !state.by_id.contains_key(&candidate) {
                break candidate;
            }
        };
        state.next_counter += 1;

        let record = ApiKey {
            key_id: key_id.clone(),
            key_hash,
            user_id: user_id.to_string(),
            name: name.to_string(),
            permissions,
            created_at: now(),
            last_used_at: None,
            revoked: false,
        };
        state.by_id.insert(key_id.clone(), record);
        state.hash_to_id.insert(key_hash, key_id.clone());

        Ok((key_id, raw_key))
    }

    /// Rejects malformed input (wrong length, non-hex) with silent
    /// not-found rather than a distinguishable error, so a probing client
    /// cannot tell "badly formed" from "well formed but unknown" apart.
    pub fn validate(&self, raw_key: &str) -> Option<AuthInfo> {
        if raw_key.len() != 64 {
            return None;
        }
        let raw_bytes = hex_decode_lower(raw_key).ok()?;
        let key_hash = sha256(&raw_bytes);

        let mut state = self.state.write().expect("api key store lock poisoned");
        let key_id = state.hash_to_id.get(&key_hash)?.clone();
        let record = state.by_id.get_mut(&key_id)?;
        if record.revoked {
            return None;
        }
        record.last_used_at = Some(now());

        Some(AuthInfo {
            user_id: record.user_id.clone(),
            auth_method: AuthMethod::ApiKey,
            api_key_id: Some(record.key_id.clone()),
            permissions: record.permissions.clone(),
        })
    }

    /// Idempotent: the second call on an already-revoked key returns false.
    pub fn revoke(&self, key_id: &str) -> bool {
        let mut state = self.state.write().expect("api key store lock poisoned");
        let Some(record) = state.by_id.get_mut(key_id) else {
            return false;
        };
        if record.revoked {
            return false;
        }
        record.revoked = true;
        let hash = record.key_hash;
        state.hash_to_id.remove(&hash);
        true
    }

    pub fn list(&self, user_id: &str) -> Vec<ApiKey> {
        let state = self.state.read().expect("api key store lock poisoned");
        state.by_id.values().filter(|k| k.user_id == user_id).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        let state = self.state.read().expect("api key store lock poisoned");
        state.by_id.values().filter(|k| !k.revoked).count()
    }
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_validate_round_trips() {
        let store = ApiKeyStore::new();
        let mut perms = BTreeSet::new();
        perms.insert("read_orders".to_string());
        let (key_id, raw_key) = store.create("u1", "ci-key", perms).unwrap();
        let info = store.validate(&raw_key).expect("valid key");
        assert_eq!(info.user_id, "u1");
        assert_eq!(info.api_key_id.as_deref(), Some(key_id.as_str()));
    }

    #[test]
    fn revoke_is_idempotent_and_blocks_validation() {
        let store = ApiKeyStore::new();
        let (key_id, raw_key) = store.create("u1", "k", BTreeSet::new()).unwrap();
        assert!(store.revoke(&key_id));
        assert!(!store.revoke(&key_id));
        assert!(store.validate(&raw_key).is_none());
    }

    #[test]
    fn malformed_input_is_silent_not_found() {
        let store = ApiKeyStore::new();
        assert!(store.validate("too-short").is_none());
        assert!(store.validate(&"z".repeat(64)).is_none());
    }

    #[test]
    fn list_scopes_to_user() {
        let store = ApiKeyStore::new();
        store.create("u1", "a", BTreeSet::new()).unwrap();
        store.create("u2", "b", BTreeSet::new()).unwrap();
        assert_eq!(store.list("u1").len(), 1);
        assert_eq!(store.active_count(), 2);
    }
}
