//! Durable persistence for the bearer credential
//!
//! The platform keeps one string value, the token, in durable storage: written
//! on login and refresh, removed on logout. Persistence is best-effort: a
//! failed write is logged and swallowed, and the in-memory store stays
//! authoritative for the rest of the process lifetime.

use async_trait::async_trait;
use std::error;

use crate::token::BearerToken;

#[cfg(feature = "file")]
pub mod file;
pub mod in_memory;

#[cfg(feature = "file")]
pub use file::FileCredentialCache;
pub use in_memory::InMemoryCredentialCache;

/// The boxed error produced at the persistence seam
pub type CacheError = Box<dyn error::Error + Send + Sync + 'static>;

/// An asynchronous durable store for the bearer credential
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Reads the persisted credential, if one is present
    async fn load(&self) -> Result<Option<BearerToken>, CacheError>;

    /// Persists the credential
    async fn store(&self, token: &BearerToken) -> Result<(), CacheError>;

    /// Removes any persisted credential
    async fn clear(&self) -> Result<(), CacheError>;
}
