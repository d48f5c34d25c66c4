//! Random secrets and token digests
//!
//! Every secret gatehouse hands to a browser (session identifiers, CSRF
//! secrets, remember-me cookies) is 256 bits from the operating system RNG,
//! encoded as URL-safe base64. Secrets that are persisted are stored only as
//! their SHA-256 digest, so a leaked table cannot be replayed as cookies.
//!
//! Comparisons against secrets go through [`constant_time_compare`].

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Number of random bytes in every generated secret.
pub const SECRET_BYTES: usize = 32;

/// Generate a 256-bit random secret encoded as URL-safe base64 (43 characters).
///
/// # Panics
///
/// Panics if the OS random number generator fails. There is no safe way to
/// continue issuing credentials without an entropy source.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex-encoded SHA-256 digest of `token`, used as the lookup key in storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two byte slices without exiting early on the first mismatch.
///
/// Slices of different length compare unequal immediately; lengths of the
/// values compared here are public (fixed-size encodings).
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secure_token_shape() {
        let token = generate_secure_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 32);
    }

    #[test]
    fn test_generate_secure_token_is_unique() {
        let tokens: std::collections::HashSet<_> =
            (0..100).map(|_| generate_secure_token()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_token("remember-me");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_token("remember-me"));
        assert_ne!(hash, hash_token("remember-you"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"csrf-secret", b"csrf-secret"));
        assert!(constant_time_compare(b"", b""));
        assert!(!constant_time_compare(b"csrf-secret", b"csrf-secreT"));
        assert!(!constant_time_compare(b"short", b"longer_value"));
        assert!(!constant_time_compare(b"", b"x"));
    }
}
