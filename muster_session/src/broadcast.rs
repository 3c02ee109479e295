//! The process-wide logout signal
//!
//! The expiry-recovery path sits deep in the request layer; the session
//! controller sits at the top of the application. The broadcast channel lets
//! the former announce an unrecoverable logout to the latter (and to any
//! other subscriber) without a direct reference through every layer.

use tokio::sync::broadcast;

use crate::{error::LogoutReason, session::Portal};

const CHANNEL_CAPACITY: usize = 16;

/// A published logout announcement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogoutNotice {
    /// Why the session ended
    pub reason: LogoutReason,
    /// The login surface the signed-out user belongs on
    pub portal: Portal,
}

/// The single-process logout publish/subscribe channel
///
/// No persistence and no cross-process delivery; a notice published with no
/// live subscriber is dropped.
#[derive(Clone, Debug)]
pub struct LogoutBroadcast {
    tx: broadcast::Sender<LogoutNotice>,
}

impl LogoutBroadcast {
    /// Constructs a new channel
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes a logout notice to all current subscribers
    pub fn publish(&self, notice: LogoutNotice) {
        match self.tx.send(notice) {
            Ok(subscribers) => {
                tracing::debug!(
                    reason = ?notice.reason,
                    portal = ?notice.portal,
                    subscribers,
                    "published logout notice"
                );
            }
            Err(_) => {
                tracing::debug!(reason = ?notice.reason, "no logout subscribers");
            }
        }
    }

    /// Subscribes to future logout notices
    pub fn subscribe(&self) -> broadcast::Receiver<LogoutNotice> {
        self.tx.subscribe()
    }
}

impl Default for LogoutBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer-registered hook invoked after a hard logout
///
/// Receives the portal the signed-out user should be sent to. The hook fires
/// one scheduler tick after the notice is published, so subscribers observe
/// the notice and clear local state first. Suppressing the redirect when the
/// user is already on a login or registration surface is the hook's business.
pub trait ReauthSink: Send + Sync {
    /// Sends the user to the given login surface
    fn reauthenticate(&self, portal: Portal);
}
