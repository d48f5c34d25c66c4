use crate::{
    Error,
    user::{Credential, NewCredential, UserId},
};
use async_trait::async_trait;

/// Read access to user accounts, plus registration.
///
/// Email lookups are exact; callers normalise case before calling.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Store a new account. Fails with a constraint error if the email is taken.
    async fn create(&self, credential: NewCredential) -> Result<Credential, Error>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, Error>;

    /// Activate or deactivate an account.
    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error>;
}
