//! Password hashing.
//!
//! Argon2id with a fresh random salt per hash, stored in PHC string format so
//! the parameters travel with the hash. Hashes made under older parameters
//! still verify after the config changes.

use std::sync::OnceLock;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::{Error, config::PasswordConfig, error::CryptoError};

/// A PHC-formatted password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedCredential(String);

impl HashedCredential {
    pub fn new(hash: &str) -> Self {
        HashedCredential(hash.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for HashedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashedCredential(..)")
    }
}

impl From<String> for HashedCredential {
    fn from(s: String) -> Self {
        Self(s)
    }
}

pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: OnceLock<HashedCredential>,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, Error> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: OnceLock::new(),
        })
    }

    /// Hash a password with a fresh salt.
    pub fn hash(&self, password: &str) -> Result<HashedCredential, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        Ok(HashedCredential(hash.to_string()))
    }

    /// Check a password against a stored hash.
    ///
    /// Mismatches and unparsable hashes both return `false`; a corrupt stored
    /// hash is logged. The digest comparison inside argon2 is constant time.
    pub fn verify(&self, password: &str, stored: &HashedCredential) -> bool {
        let parsed = match PasswordHash::new(stored.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend the same work as a real verification when there is no account to
    /// check against, so unknown emails are not faster to reject.
    pub fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy_hash.get_or_init(|| {
            self.hash("gatehouse-dummy-password")
                .unwrap_or_else(|_| HashedCredential::new(""))
        });
        let _ = self.verify(password, dummy);
    }
}
