//! The session controller and the handle it shares with the request layer

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::{
    api::AuthBackend,
    broadcast::{LogoutBroadcast, LogoutNotice, ReauthSink},
    cache::CredentialCache,
    error::{AuthError, LogoutReason},
    refresh::RefreshGate,
    scheduler::{RefreshScheduler, SchedulerConfig},
    session::{Identity, Portal, Role, Session, SessionState},
    store::CredentialStore,
    token::BearerToken,
};

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Configures and builds a [`SessionController`]
pub struct SessionControllerBuilder {
    backend: Arc<dyn AuthBackend>,
    cache: Arc<dyn CredentialCache>,
    scheduler: SchedulerConfig,
    sink: Option<Arc<dyn ReauthSink>>,
}

impl SessionControllerBuilder {
    /// Starts a builder from the authentication backend and credential cache
    pub fn new(backend: Arc<dyn AuthBackend>, cache: Arc<dyn CredentialCache>) -> Self {
        Self {
            backend,
            cache,
            scheduler: SchedulerConfig::default(),
            sink: None,
        }
    }

    /// Overrides the background scheduler intervals
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Registers the hook invoked after a hard logout
    pub fn reauth_sink(mut self, sink: Arc<dyn ReauthSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the controller, spawning its background tasks
    ///
    /// Must be called from within a tokio runtime. The scheduler's interval
    /// tasks and the logout subscription start immediately; each tick is a
    /// no-op until a credential is held.
    pub fn build(self) -> SessionController {
        let (state, _) = watch::channel(SessionState::initial());

        let inner = Arc::new(Inner {
            backend: self.backend,
            cache: self.cache,
            store: CredentialStore::new(),
            gate: RefreshGate::new(),
            broadcast: LogoutBroadcast::new(),
            sink: self.sink,
            state,
            scheduler: Mutex::new(RefreshScheduler::idle()),
            subscription: Mutex::new(None),
            bootstrapped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let handle = SessionHandle {
            inner: Arc::clone(&inner),
        };
        *lock_or_recover(&inner.scheduler) = RefreshScheduler::spawn(handle, &self.scheduler);
        *lock_or_recover(&inner.subscription) = Some(spawn_subscription(&inner));

        SessionController { inner }
    }
}

impl fmt::Debug for SessionControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionControllerBuilder")
            .field("scheduler", &self.scheduler)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    cache: Arc<dyn CredentialCache>,
    store: CredentialStore,
    gate: RefreshGate,
    broadcast: LogoutBroadcast,
    sink: Option<Arc<dyn ReauthSink>>,
    state: watch::Sender<SessionState>,
    scheduler: Mutex<RefreshScheduler>,
    subscription: Mutex<Option<JoinHandle<()>>>,
    bootstrapped: AtomicBool,
    closed: AtomicBool,
}

impl Inner {
    fn set_identity(&self, identity: Option<Identity>) {
        self.state.send_modify(|s| s.identity = identity);
    }

    fn portal(&self) -> Portal {
        self.store
            .identity()
            .map(|identity| identity.role.portal())
            .unwrap_or(Portal::Client)
    }

    async fn persist(&self, token: &BearerToken) {
        if let Err(error) = self.cache.store(token).await {
            tracing::warn!(
                error = (&*error as &dyn std::error::Error),
                "unable to persist credential, keeping it in memory"
            );
        }
    }

    async fn clear_persisted(&self) {
        if let Err(error) = self.cache.clear().await {
            tracing::warn!(
                error = (&*error as &dyn std::error::Error),
                "unable to remove persisted credential"
            );
        }
    }

    /// Performs the shared, single-flight refresh
    ///
    /// On success the store is already updated by the time any waiter
    /// observes the outcome. On failure nothing is mutated; failure policy
    /// belongs to the caller.
    async fn run_refresh(self: Arc<Self>) -> Result<Arc<Session>, AuthError> {
        let inner = Arc::clone(&self);
        self.gate
            .run(async move {
                let token = inner.store.token().ok_or(AuthError::NoCredential)?;
                let resp = inner.backend.refresh(&token).await?;

                let role = match resp.user_type {
                    Some(role) => Some(role),
                    None => inner.store.identity().map(|identity| identity.role),
                };
                let identity = role.map(|role| Identity {
                    subject: resp.user,
                    role,
                });

                let session = inner.store.set(resp.token, identity);
                inner.persist(&session.credential).await;
                inner.set_identity(session.identity.clone());
                tracing::debug!("credential refreshed");
                Ok(session)
            })
            .await
    }

    /// Terminates the session from the request layer
    ///
    /// Clears the stores and publishes the logout notice; the controller's
    /// subscription completes the local cleanup. The reauth hook fires only
    /// after a yield point so subscribers observe the notice first.
    async fn force_logout(&self, reason: LogoutReason) {
        let portal = self.portal();
        let had = self.store.clear();
        self.clear_persisted().await;

        if had {
            tracing::info!(reason = ?reason, "session terminated");
        }

        self.broadcast.publish(LogoutNotice { reason, portal });

        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                sink.reauthenticate(portal);
            });
        }
    }

    /// The subscription-side reaction to a logout notice
    async fn settle_logout(&self) {
        self.store.clear();
        self.clear_persisted().await;
        lock_or_recover(&self.scheduler).shutdown();
        self.set_identity(None);
    }
}

fn spawn_subscription(inner: &Arc<Inner>) -> JoinHandle<()> {
    let mut rx = inner.broadcast.subscribe();
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notice) => {
                    tracing::info!(reason = ?notice.reason, "logout notice received");
                    inner.settle_logout().await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "logout notices lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// A cheap handle onto the session shared with the request layer
///
/// The expiry-recovery middleware and the background scheduler act through
/// this handle rather than holding the controller itself.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    /// The current credential, if any
    pub fn token(&self) -> Option<BearerToken> {
        self.inner.store.token()
    }

    /// The current identity, if known
    pub fn identity(&self) -> Option<Identity> {
        self.inner.store.identity()
    }

    /// Subscribes to session-state changes
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Subscribes to logout notices
    pub fn logout_notices(&self) -> broadcast::Receiver<LogoutNotice> {
        self.inner.broadcast.subscribe()
    }

    /// Requests a credential refresh through the single-flight gate
    ///
    /// No session state is mutated on failure; the caller applies its own
    /// failure policy.
    pub async fn try_refresh(&self) -> Result<Arc<Session>, AuthError> {
        Arc::clone(&self.inner).run_refresh().await
    }

    /// Performs the authenticated liveness probe
    pub async fn keep_alive(&self) -> Result<(), AuthError> {
        let token = self.token().ok_or(AuthError::NoCredential)?;
        self.inner.backend.keep_alive(&token).await
    }

    /// Terminates the session and announces it to all subscribers
    pub async fn force_logout(&self, reason: LogoutReason) {
        self.inner.force_logout(reason).await;
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("store", &self.inner.store)
            .finish()
    }
}

/// The owner of the session lifecycle
///
/// Bootstraps the persisted session, performs login and logout, owns the
/// background refresh scheduler, and reacts to logout notices from the
/// request layer. Consumers observe the session through [`Self::state`].
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// A handle for the request layer and background tasks
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Subscribes to session-state changes
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Subscribes to logout notices
    pub fn logout_notices(&self) -> broadcast::Receiver<LogoutNotice> {
        self.inner.broadcast.subscribe()
    }

    /// The current identity, if authenticated
    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    /// True only until the initial bootstrap check resolves
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    fn state_snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Restores any persisted session
    ///
    /// Performed once per process: a second call returns the current state
    /// without touching the network. The loading flag drops exactly once,
    /// whatever branch resolves the bootstrap. A result arriving after
    /// [`Self::shutdown`] is discarded.
    pub async fn bootstrap(&self) -> SessionState {
        if self.inner.bootstrapped.swap(true, Ordering::SeqCst) {
            tracing::debug!("bootstrap already performed");
            return self.state_snapshot();
        }

        let identity = self.run_bootstrap().await;

        if self.inner.closed.load(Ordering::SeqCst) {
            tracing::debug!("controller torn down during bootstrap, discarding result");
            return self.state_snapshot();
        }

        self.inner.state.send_modify(|s| {
            s.identity = identity;
            s.loading = false;
        });
        self.state_snapshot()
    }

    async fn run_bootstrap(&self) -> Option<Identity> {
        let inner = &self.inner;

        let token = match inner.cache.load().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("no persisted credential");
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    error = (&*error as &dyn std::error::Error),
                    "unable to read persisted credential"
                );
                return None;
            }
        };

        // Attach the credential first; the identity arrives with the check.
        inner.store.set(token.clone(), None);

        let original = match inner.backend.me(&token).await {
            Ok(me) => {
                let identity = Identity {
                    subject: me.user,
                    role: me.user_type,
                };
                inner.store.set(token, Some(identity.clone()));
                tracing::info!(role = identity.role.as_str(), "session restored");
                return Some(identity);
            }
            Err(error) if error.is_auth_rejection() => error,
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn std::error::Error),
                    "identity check failed, keeping credential for a later retry"
                );
                return None;
            }
        };

        tracing::debug!("credential rejected at bootstrap, attempting refresh");

        match Arc::clone(inner).run_refresh().await {
            Ok(session) => match session.identity.clone() {
                Some(identity) => Some(identity),
                None => self.recheck_identity(&session.credential).await,
            },
            Err(refresh_error) => {
                if let Some(reason) = original.logout_reason() {
                    tracing::warn!(
                        error = (&refresh_error as &dyn std::error::Error),
                        "unrecoverable credential, clearing session"
                    );
                    inner.force_logout(reason).await;
                } else {
                    tracing::warn!(
                        error = (&refresh_error as &dyn std::error::Error),
                        "refresh failed, keeping credential for a later retry"
                    );
                }
                None
            }
        }
    }

    /// Fetches the identity behind a freshly issued credential
    async fn recheck_identity(&self, token: &BearerToken) -> Option<Identity> {
        match self.inner.backend.me(token).await {
            Ok(me) => {
                let identity = Identity {
                    subject: me.user,
                    role: me.user_type,
                };
                self.inner
                    .store
                    .set(token.clone(), Some(identity.clone()));
                Some(identity)
            }
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn std::error::Error),
                    "identity recheck failed, keeping credential for a later retry"
                );
                None
            }
        }
    }

    /// Exchanges credentials for a session
    ///
    /// On success the credential and identity are written together and the
    /// credential is persisted. On failure nothing is mutated and the
    /// server's message travels back in the error.
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<Arc<Session>, AuthError> {
        let resp = self.inner.backend.login(role, email, password).await?;

        let identity = Identity {
            subject: resp.user,
            role,
        };
        let session = self.inner.store.set(resp.token, Some(identity.clone()));
        self.inner.persist(&session.credential).await;
        self.inner.set_identity(Some(identity));
        tracing::info!(role = role.as_str(), "signed in");
        Ok(session)
    }

    /// Explicitly refreshes the credential
    ///
    /// Delegates to the single-flight gate; any failure ends the session.
    pub async fn refresh(&self) -> Result<Arc<Session>, AuthError> {
        match Arc::clone(&self.inner).run_refresh().await {
            Ok(session) => Ok(session),
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn std::error::Error),
                    "refresh failed, signing out"
                );
                let reason = error.logout_reason().unwrap_or(LogoutReason::RefreshFailed);
                self.end_session(reason).await;
                Err(error)
            }
        }
    }

    /// Signs the session out
    ///
    /// Clears the credential store and the persisted credential, cancels the
    /// scheduler's interval tasks, drops the logout subscription, and resets
    /// the identity. Calling twice is a no-op the second time.
    pub async fn logout(&self) {
        self.end_session(LogoutReason::Manual).await;
    }

    async fn end_session(&self, reason: LogoutReason) {
        let had = self.inner.store.clear();
        self.inner.clear_persisted().await;
        lock_or_recover(&self.inner.scheduler).shutdown();
        if let Some(subscription) = lock_or_recover(&self.inner.subscription).take() {
            subscription.abort();
        }
        self.inner.set_identity(None);

        if had {
            tracing::info!(reason = ?reason, "session ended");
        } else {
            tracing::debug!("logout requested with no active session");
        }
    }

    #[cfg(test)]
    pub(crate) fn scheduler_is_active(&self) -> bool {
        lock_or_recover(&self.inner.scheduler).is_active()
    }

    /// Tears the controller down without signing out
    ///
    /// Cancels the background tasks and marks the controller closed so an
    /// in-flight bootstrap discards its result. The persisted credential is
    /// left in place for the next process.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        lock_or_recover(&self.inner.scheduler).shutdown();
        if let Some(subscription) = lock_or_recover(&self.inner.subscription).take() {
            subscription.abort();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("store", &self.inner.store)
            .field("loading", &self.is_loading())
            .finish()
    }
}
