//! HS256 JWT issuance and verification with an in-memory refresh-token
//! revocation set. Deliberately hand-rolled rather than built on a JWT
//! crate: the wire format is three base64url segments joined by `.`, and
//! verification is a handful of constant-time, allocation-light steps that
//! need to run in well under the microsecond-scale budget of the auth
//! coordinator's hot path.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use veloz_crypto::{base64url_decode, base64url_encode, constant_time_eq, hex_encode, hmac_sha256, random_bytes};

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims recovered from a successfully verified token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: String,
    pub api_key_id: Option<String>,
    pub issued_at: u64,
    pub expires_at: u64,
    pub jti: Option<String>,
}

/// Reasons a verification attempt can fail. Returned to callers only for
/// logging/metrics — the client-facing response always collapses to
/// `unauthenticated` per the shared error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtError {
    InvalidFormat,
    InvalidBase64,
    InvalidJson,
    Expired,
    FutureIssued,
    InvalidSignature,
    MissingClaims,
    Revoked,
    AlgorithmMismatch,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    sub: String,
    iat: u64,
    exp: u64,
    #[serde(rename = "type")]
    token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
}

pub struct JwtManager {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_expiry_seconds: u64,
    refresh_expiry_seconds: u64,
    /// Small positive allowance for clock skew between the issuer and a
    /// verifier running slightly behind (Open Question: wall clock is used,
    /// not monotonic time, since tokens cross process boundaries).
    skew_seconds: u64,
    revoked: Mutex<HashSet<String>>,
    last_error: Mutex<Option<JwtError>>,
}

impl JwtManager {
    pub fn new(secret: Vec<u8>, refresh_secret: Option<Vec<u8>>, access_expiry_seconds: u64, refresh_expiry_seconds: u64) -> Self {
        let refresh_secret = refresh_secret.unwrap_or_else(|| secret.clone());
        Self {
            access_secret: secret,
            refresh_secret,
            access_expiry_seconds,
            refresh_expiry_seconds,
            skew_seconds: 5,
            revoked: Mutex::new(HashSet::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn create_access_token(&self, user_id: &str, api_key_id: Option<&str>) -> String {
        let now = current_timestamp();
        let payload = Payload {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.access_expiry_seconds,
            token_type: TokenType::Access.as_str().to_string(),
            api_key_id: api_key_id.map(|s| s.to_string()),
            jti: None,
        };
        self.sign(&payload, &self.access_secret)
    }

    pub fn create_refresh_token(&self, user_id: &str) -> String {
        let now = current_timestamp();
        let jti = hex_encode(&random_bytes(16));
        let payload = Payload {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.refresh_expiry_seconds,
            token_type: TokenType::Refresh.as_str().to_string(),
            api_key_id: None,
            jti: Some(jti),
        };
        self.sign(&payload, &self.refresh_secret)
    }

    pub fn verify_access_token(&self, token: &str) -> Option<TokenInfo> {
        self.verify(token, &self.access_secret, TokenType::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Option<TokenInfo> {
        let info = self.verify(token, &self.refresh_secret, TokenType::Refresh)?;
        let jti = info.jti.as_deref()?;
        if self.revoked.lock().expect("revoked lock poisoned").contains(jti) {
            self.set_last_error(JwtError::Revoked);
            return None;
        }
        Some(info)
    }

    pub fn revoke_refresh_token(&self, jti: &str) {
        self.revoked.lock().expect("revoked lock poisoned").insert(jti.to_string());
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.lock().expect("revoked lock poisoned").len()
    }

    pub fn clear_revoked(&self) {
        self.revoked.lock().expect("revoked lock poisoned").clear();
    }

    /// The source declares a time-based pruning operation but never tracks
    /// per-JTI revocation timestamps, so there is nothing to prune by age.
    /// Kept as a documented no-op (see DESIGN.md) rather than silently
    /// dropped, since callers may still invoke it as part of a maintenance
    /// sweep.
    pub fn cleanup_old_revoked_tokens(&self, _before_timestamp: u64) {}

    pub fn last_error(&self) -> Option<JwtError> {
        *self.last_error.lock().expect("last_error lock poisoned")
    }

    /// Read the subject claim without verifying the signature. Used only by
    /// the admin key-revocation path to recover a JTI from an otherwise
    /// expired or already-revoked refresh token.
    pub fn extract_payload(token: &str) -> Option<Value> {
        let mut parts = token.split('.');
        let _header = parts.next()?;
        let payload_b64 = parts.next()?;
        if parts.next().is_none() {
            return None;
        }
        let payload_bytes = base64url_decode(payload_b64).ok()?;
        serde_json::from_slice(&payload_bytes).ok()
    }

    pub fn extract_jti(token: &str) -> Option<String> {
        Self::extract_payload(token)?.get("jti")?.as_str().map(|s| s.to_string())
    }

    fn sign(&self, payload: &Payload, secret: &[u8]) -> String {
        let header_b64 = base64url_encode(HEADER_JSON.as_bytes());
        let payload_json = serde_json::to_vec(payload).expect("payload always serializable");
        let payload_b64 = base64url_encode(&payload_json);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = hmac_sha256(secret, signing_input.as_bytes()).expect("hmac key always valid length");
        let signature_b64 = base64url_encode(&signature);
        format!("{signing_input}.{signature_b64}")
    }

    fn verify(&self, token: &str, secret: &[u8], expected_type: TokenType) -> Option<TokenInfo> {
        self.clear_last_error();
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => {
                self.set_last_error(JwtError::InvalidFormat);
                return None;
            }
        };

        let header_bytes = match base64url_decode(header_b64) {
            Ok(b) => b,
            Err(_) => {
                self.set_last_error(JwtError::InvalidBase64);
                return None;
            }
        };
        let header: Value = match serde_json::from_slice(&header_bytes) {
            Ok(v) => v,
            Err(_) => {
                self.set_last_error(JwtError::InvalidJson);
                return None;
            }
        };
        if header.get("alg").and_then(Value::as_str) != Some("HS256") {
            self.set_last_error(JwtError::AlgorithmMismatch);
            return None;
        }

        let signing_input = format!("{header_b64}.{payload_b64}");
        let expected_signature = match hmac_sha256(secret, signing_input.as_bytes()) {
            Ok(sig) => sig,
            Err(_) => {
                self.set_last_error(JwtError::InvalidSignature);
                return None;
            }
        };
        let provided_signature = match base64url_decode(signature_b64) {
            Ok(b) => b,
            Err(_) => {
                self.set_last_error(JwtError::InvalidBase64);
                return None;
            }
        };
        if !constant_time_eq(&expected_signature, &provided_signature) {
            self.set_last_error(JwtError::InvalidSignature);
            return None;
        }

        let payload_bytes = match base64url_decode(payload_b64) {
            Ok(b) => b,
            Err(_) => {
                self.set_last_error(JwtError::InvalidBase64);
                return None;
            }
        };
        let payload: Value = match serde_json::from_slice(&payload_bytes) {
            Ok(v) => v,
            Err(_) => {
                self.set_last_error(JwtError::InvalidJson);
                return None;
            }
        };

        let sub = payload.get("sub").and_then(Value::as_str);
        let iat = payload.get("iat").and_then(Value::as_u64);
        let exp = payload.get("exp").and_then(Value::as_u64);
        let (sub, iat, exp) = match (sub, iat, exp) {
            (Some(s), Some(i), Some(e)) => (s, i, e),
            _ => {
                self.set_last_error(JwtError::MissingClaims);
                return None;
            }
        };

        let now = current_timestamp();
        if iat > now + self.skew_seconds {
            self.set_last_error(JwtError::FutureIssued);
            return None;
        }
        if exp <= now {
            self.set_last_error(JwtError::Expired);
            return None;
        }

        if payload.get("type").and_then(Value::as_str) != Some(expected_type.as_str()) {
            self.set_last_error(JwtError::MissingClaims);
            return None;
        }

        let jti = payload.get("jti").and_then(Value::as_str).map(|s| s.to_string());
        if expected_type == TokenType::Refresh && jti.is_none() {
            self.set_last_error(JwtError::MissingClaims);
            return None;
        }

        let api_key_id = payload.get("api_key_id").and_then(Value::as_str).map(|s| s.to_string());

        Some(TokenInfo {
            user_id: sub.to_string(),
            api_key_id,
            issued_at: iat,
            expires_at: exp,
            jti,
        })
    }

    fn set_last_error(&self, err: JwtError) {
        *self.last_error.lock().expect("last_error lock poisoned") = Some(err);
    }

    fn clear_last_error(&self) {
        *self.last_error.lock().expect("last_error lock poisoned") = None;
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new(b"a-secret-that-is-at-least-32-bytes!".to_vec(), None, 3600, 604800)
    }

    #[test]
    fn access_token_round_trips() {
        let mgr = manager();
        let token = mgr.create_access_token("trader-1", None);
        let info = mgr.verify_access_token(&token).expect("verifies");
        assert_eq!(info.user_id, "trader-1");
        assert_eq!(info.expires_at - info.issued_at, 3600);
    }

    #[test]
    fn refresh_token_carries_jti_and_can_be_revoked() {
        let mgr = manager();
        let token = mgr.create_refresh_token("trader-1");
        let info = mgr.verify_refresh_token(&token).expect("verifies");
        let jti = info.jti.expect("refresh token has jti");
        mgr.revoke_refresh_token(&jti);
        assert!(mgr.verify_refresh_token(&token).is_none());
        assert_eq!(mgr.last_error(), Some(JwtError::Revoked));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mgr = manager();
        let token = mgr.create_access_token("trader-1", None);
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(mgr.verify_access_token(&tampered).is_none());
    }

    #[test]
    fn tampered_payload_byte_is_rejected() {
        let mgr = manager();
        let token = mgr.create_access_token("trader-1", None);
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload = parts[1].to_string();
        // Flip a character in the base64url payload segment.
        let mut chars: Vec<char> = payload.chars().collect();
        let idx = chars.len() / 2;
        chars[idx] = if chars[idx] == 'a' { 'b' } else { 'a' };
        payload = chars.into_iter().collect();
        let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);
        assert!(mgr.verify_access_token(&tampered).is_none());
    }

    #[test]
    fn wrong_token_type_is_rejected() {
        let mgr = manager();
        let access = mgr.create_access_token("trader-1", None);
        assert!(mgr.verify_refresh_token(&access).is_none());
    }

    #[test]
    fn revoke_is_idempotent_in_effect() {
        let mgr = manager();
        let before = mgr.revoked_count();
        let token = mgr.create_refresh_token("u");
        let jti = mgr.verify_refresh_token(&token).unwrap().jti.unwrap();
        mgr.revoke_refresh_token(&jti);
        mgr.revoke_refresh_token(&jti);
        assert_eq!(mgr.revoked_count(), before + 1);
    }

    #[test]
    fn malformed_token_sets_invalid_format() {
        let mgr = manager();
        assert!(mgr.verify_access_token("not-a-jwt").is_none());
        assert_eq!(mgr.last_error(), Some(JwtError::InvalidFormat));
    }
}
