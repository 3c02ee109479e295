use std::{
    fmt,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    session::{Identity, Session},
    token::BearerToken,
};

/// The single source of truth for the current credential and identity
///
/// The pair is held as one `Arc<Session>` behind one lock, so a write replaces
/// both fields at once and no reader ever observes an identity without its
/// credential. Only the session controller and the expiry-recovery path
/// write; everything else reads.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<Arc<Session>>>>,
}

impl CredentialStore {
    /// Constructs an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<Session>>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<Session>>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The current session, if any
    pub fn current(&self) -> Option<Arc<Session>> {
        self.read().clone()
    }

    /// The current credential, if any
    pub fn token(&self) -> Option<BearerToken> {
        self.read().as_ref().map(|s| s.credential.clone())
    }

    /// The current identity, if known
    pub fn identity(&self) -> Option<Identity> {
        self.read().as_ref().and_then(|s| s.identity.clone())
    }

    /// Replaces the session, writing credential and identity together
    ///
    /// Returns the stored session.
    pub fn set(&self, credential: BearerToken, identity: Option<Identity>) -> Arc<Session> {
        let session = Arc::new(Session {
            credential,
            identity,
        });
        *self.write() = Some(Arc::clone(&session));
        session
    }

    /// Drops the session, reporting whether one was held
    pub fn clear(&self) -> bool {
        self.write().take().is_some()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let guard = self.read();
        f.debug_struct("CredentialStore")
            .field("held", &guard.is_some())
            .field(
                "role",
                &guard
                    .as_ref()
                    .and_then(|s| s.identity.as_ref())
                    .map(|i| i.role),
            )
            .finish()
    }
}
