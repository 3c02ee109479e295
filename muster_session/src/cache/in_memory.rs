//! An in-memory credential cache

use std::sync::Mutex;

use async_trait::async_trait;

use super::{CacheError, CredentialCache};
use crate::token::BearerToken;

/// An in-memory credential cache
///
/// Nothing survives the process; useful in tests and for callers that opt out
/// of durable storage.
#[derive(Default, Debug)]
pub struct InMemoryCredentialCache {
    token: Mutex<Option<BearerToken>>,
}

impl InMemoryCredentialCache {
    /// Constructs an empty in-memory cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a cache already holding a credential
    pub fn holding(token: BearerToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<BearerToken>> {
        match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CredentialCache for InMemoryCredentialCache {
    async fn load(&self) -> Result<Option<BearerToken>, CacheError> {
        Ok(self.lock().clone())
    }

    async fn store(&self, token: &BearerToken) -> Result<(), CacheError> {
        *self.lock() = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        *self.lock() = None;
        Ok(())
    }
}
