use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors produced by the crypto primitives wrapper.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid HMAC key length")]
    InvalidMacKey,
    #[error("base64url decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Compute HMAC-SHA256 over `data` with `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidMacKey)?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Fill `n` bytes from the OS CSPRNG. Unrecoverable if the entropy source
/// fails — callers must not continue with partially-filled or substitute
/// randomness for key material.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .unwrap_or_else(|err| panic!("OS entropy source failed, cannot generate secure random bytes: {err}"));
    buf
}

pub fn base64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn base64url_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode lowercase hex. Rejects uppercase or mixed-case input by
/// round-tripping through re-encoding rather than accepting it silently.
pub fn hex_decode_lower(s: &str) -> Result<Vec<u8>, CryptoError> {
    let decoded = hex::decode(s)?;
    if hex::encode(&decoded) != s {
        return Err(CryptoError::HexDecode(hex::FromHexError::InvalidStringLength));
    }
    Ok(decoded)
}

/// Compare two byte strings in time independent of the index of the first
/// difference. Unequal lengths are reported unequal without scanning.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_round_trip() {
        for sample in [&b""[..], b"a", b"ab", b"abc", b"\x00\x01\xff\xfe"] {
            let encoded = base64url_encode(sample);
            assert_eq!(base64url_decode(&encoded).unwrap(), sample);
        }
    }

    #[test]
    fn sha256_known_vector() {
        // RFC test vector for the empty string.
        let digest = sha256(b"");
        assert_eq!(
            hex_encode(&digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn hmac_sha256_is_deterministic() {
        let key = b"0123456789abcdef0123456789abcdef";
        let a = hmac_sha256(key, b"payload").unwrap();
        let b = hmac_sha256(key, b"payload").unwrap();
        assert_eq!(a, b);
        let c = hmac_sha256(key, b"other").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn constant_time_eq_matches_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn hex_round_trip_rejects_non_lowercase() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        let encoded = hex_encode(&bytes);
        assert_eq!(hex_decode_lower(&encoded).unwrap(), bytes);
        assert!(hex_decode_lower("DEADBEEF").is_err());
    }

    #[test]
    fn random_bytes_are_distinct() {
        let a = random_bytes(32);
        let b = random_bytes(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
