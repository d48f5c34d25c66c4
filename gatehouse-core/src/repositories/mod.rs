//! Repository traits for the data access layer
//!
//! Services talk to storage only through these traits, so a backend can be
//! swapped for [`memory::InMemoryRepositoryProvider`] in tests.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits give access to each repository
//! - [`RepositoryProvider`] combines all of them plus lifecycle methods
//! - `*RepositoryAdapter` structs expose one repository of a shared provider

pub mod activity;
pub mod adapter;
pub mod credential;
pub mod login_attempt;
pub mod memory;
pub mod remember_me;
pub mod session;

pub use activity::ActivityRepository;
pub use adapter::{
    ActivityRepositoryAdapter, CredentialRepositoryAdapter, LoginAttemptRepositoryAdapter,
    RememberMeRepositoryAdapter, SessionRepositoryAdapter,
};
pub use credential::CredentialRepository;
pub use login_attempt::LoginAttemptRepository;
pub use memory::InMemoryRepositoryProvider;
pub use remember_me::RememberMeRepository;
pub use session::SessionRepository;

use async_trait::async_trait;

use crate::Error;

// ============================================================================
// Individual Repository Provider Traits
// ============================================================================

pub trait CredentialRepositoryProvider: Send + Sync + 'static {
    type CredentialRepo: CredentialRepository;

    fn credential(&self) -> &Self::CredentialRepo;
}

pub trait SessionRepositoryProvider: Send + Sync + 'static {
    type SessionRepo: SessionRepository;

    fn session(&self) -> &Self::SessionRepo;
}

pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    type LoginAttemptRepo: LoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

pub trait RememberMeRepositoryProvider: Send + Sync + 'static {
    type RememberMeRepo: RememberMeRepository;

    fn remember_me(&self) -> &Self::RememberMeRepo;
}

pub trait ActivityRepositoryProvider: Send + Sync + 'static {
    type ActivityRepo: ActivityRepository;

    fn activity(&self) -> &Self::ActivityRepo;
}

// ============================================================================
// Unified Repository Provider Trait
// ============================================================================

/// Everything a storage backend must provide.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse_core::repositories::*;
///
/// impl SessionRepositoryProvider for MyStorage {
///     type SessionRepo = MySessionRepository;
///     fn session(&self) -> &Self::SessionRepo { &self.sessions }
/// }
///
/// // ... the other provider traits ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider:
    CredentialRepositoryProvider
    + SessionRepositoryProvider
    + LoginAttemptRepositoryProvider
    + RememberMeRepositoryProvider
    + ActivityRepositoryProvider
{
    /// Bring the schema up to date.
    async fn migrate(&self) -> Result<(), Error>;

    /// Fail if the backing store is unreachable.
    async fn health_check(&self) -> Result<(), Error>;
}
