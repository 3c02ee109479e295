use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{error::AuthError, session::Session};

type SharedAttempt = Shared<BoxFuture<'static, Result<Arc<Session>, AuthError>>>;

/// The single-flight guard around credential refresh
///
/// However many callers ask for a refresh while one is in flight (scheduler
/// ticks, expiry-recovery replays, explicit calls), exactly one request
/// reaches the platform, and every caller observes that one outcome. Late
/// arrivals attach to the in-flight attempt rather than queueing behind it;
/// there is no gap between checking for an attempt and joining it.
#[derive(Default)]
pub struct RefreshGate {
    in_flight: Mutex<Option<SharedAttempt>>,
}

impl RefreshGate {
    /// Constructs an idle gate
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<SharedAttempt>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether a refresh attempt is currently in flight
    pub fn in_flight(&self) -> bool {
        self.slot().is_some()
    }

    /// Joins the in-flight refresh attempt, starting `attempt` if there is none
    ///
    /// The provided future is polled only when this caller becomes the
    /// leader; otherwise it is dropped untouched and the existing attempt's
    /// outcome is returned.
    pub async fn run<F>(&self, attempt: F) -> Result<Arc<Session>, AuthError>
    where
        F: Future<Output = Result<Arc<Session>, AuthError>> + Send + 'static,
    {
        let (shared, leader) = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(existing) => (existing.clone(), false),
                None => {
                    let shared = attempt.boxed().shared();
                    *slot = Some(shared.clone());
                    (shared, true)
                }
            }
        };

        let outcome = shared.await;

        if leader {
            *self.slot() = None;
        }

        outcome
    }
}

impl fmt::Debug for RefreshGate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RefreshGate")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
