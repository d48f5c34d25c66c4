//! Credentials
//!
//! A [`Credential`] is the login-relevant slice of a PropertyHub user account:
//!
//! | Field           | Type               | Description                                   |
//! | --------------- | ------------------ | --------------------------------------------- |
//! | `id`            | `UserId`           | Stable identifier of the account.             |
//! | `full_name`     | `String`           | Display name, used in the welcome message.    |
//! | `email`         | `String`           | Unique login identifier.                      |
//! | `phone`         | `Option<String>`   | Contact number captured at registration.      |
//! | `account_type`  | `AccountType`      | Whether the user buys, sells or both.         |
//! | `password_hash` | `HashedCredential` | bcrypt hash of the password.                  |
//! | `is_active`     | `bool`             | Deactivated accounts cannot log in.           |
//! | `created_at`    | `DateTime`         | When the account was registered.              |
//! | `updated_at`    | `DateTime`         | When the account was last changed.            |
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::{ValidationError, utilities::RequiredFieldExt},
    id::{generate_prefixed_id, validate_prefixed_id},
    services::password::HashedCredential,
};

/// A unique, stable identifier for a user account.
/// Treat this as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Buyer,
    Seller,
    #[default]
    Both,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Buyer => "buyer",
            AccountType::Seller => "seller",
            AccountType::Both => "both",
        }
    }
}

impl FromStr for AccountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(AccountType::Buyer),
            "seller" => Ok(AccountType::Seller),
            "both" => Ok(AccountType::Both),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown account type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub account_type: AccountType,
    pub password_hash: HashedCredential,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for a credential that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub account_type: AccountType,
    pub password_hash: HashedCredential,
    pub is_active: bool,
}

impl NewCredential {
    pub fn builder() -> NewCredentialBuilder {
        NewCredentialBuilder::default()
    }
}

#[derive(Default)]
pub struct NewCredentialBuilder {
    id: Option<UserId>,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    account_type: Option<AccountType>,
    password_hash: Option<HashedCredential>,
    is_active: Option<bool>,
}

impl NewCredentialBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }

    pub fn password_hash(mut self, password_hash: HashedCredential) -> Self {
        self.password_hash = Some(password_hash);
        self
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn build(self) -> Result<NewCredential, Error> {
        Ok(NewCredential {
            id: self.id.unwrap_or_default(),
            full_name: self.full_name.require_field("Full name")?,
            email: self.email.require_field("Email")?,
            phone: self.phone,
            account_type: self.account_type.unwrap_or_default(),
            password_hash: self.password_hash.require_field("Password hash")?,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}
