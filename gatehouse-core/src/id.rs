//! Prefixed identifiers
//!
//! Non-secret identifiers (users, activity log rows) use the
//! `{prefix}_{random}` shape, where the random part is 96 bits of URL-safe
//! base64. Session identifiers are secrets and come from
//! [`crate::crypto::generate_secure_token`] instead.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

const ID_ENTROPY_BYTES: usize = 12;

/// Generate `{prefix}_{random}` with 96 bits of entropy.
///
/// # Panics
///
/// Panics if the OS random number generator fails.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; ID_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Check that `id` is `{expected_prefix}_` followed by at least 96 bits of base64.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= ID_ENTROPY_BYTES,
        Err(_) => false,
    }
}
