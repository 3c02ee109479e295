//! The error taxonomy separating hard credential rejections from transient
//! failures

use std::{error, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error while talking to the platform's authentication surface
///
/// The error is cheaply cloneable so that every waiter on a shared refresh
/// attempt can observe the same outcome.
#[derive(Clone, Debug, Error)]
pub enum AuthError {
    /// The platform answered with a non-success status
    #[error("platform rejected the request ({status}): {message}")]
    Rejected {
        /// The HTTP status code
        status: u16,
        /// The server-provided message, if any
        message: String,
    },
    /// The request never produced a usable response
    ///
    /// Connection failures and timeouts land here. They say nothing about the
    /// credential, so they never terminate a session.
    #[error("error sending request to the platform")]
    Transport(#[source] Arc<dyn error::Error + Send + Sync + 'static>),
    /// The response body could not be decoded
    #[error("error decoding platform response")]
    Decode(#[source] Arc<serde_json::Error>),
    /// No credential is held, so an authenticated call cannot be made
    #[error("no credential held")]
    NoCredential,
}

/// The reason a session was terminated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The credential passed its lifetime
    TokenExpired,
    /// The credential was rejected as malformed or revoked
    TokenInvalid,
    /// The platform saw no credential at all
    TokenMissing,
    /// A refresh attempt requested by the application failed
    RefreshFailed,
    /// The user signed out
    Manual,
}

/// The fixed set of server messages that identify an unrecoverable credential.
///
/// A 401 carrying any other message is treated as transient and leaves the
/// session in place for a later retry, even if the token turns out to be
/// permanently bad. The routine background refresh remains the backstop.
const HARD_REJECTIONS: &[(&str, LogoutReason)] = &[
    ("Token has expired", LogoutReason::TokenExpired),
    ("jwt expired", LogoutReason::TokenExpired),
    ("Invalid token", LogoutReason::TokenInvalid),
    ("jwt malformed", LogoutReason::TokenInvalid),
    ("No token provided", LogoutReason::TokenMissing),
    ("Token is missing", LogoutReason::TokenMissing),
];

/// Looks up the logout reason for a hard rejection message
pub fn hard_rejection_reason(message: &str) -> Option<LogoutReason> {
    let message = message.trim();
    HARD_REJECTIONS
        .iter()
        .find(|(hard, _)| message.eq_ignore_ascii_case(hard))
        .map(|&(_, reason)| reason)
}

impl AuthError {
    /// Wraps a transport-level failure
    pub fn transport(err: impl error::Error + Send + Sync + 'static) -> Self {
        AuthError::Transport(Arc::new(err))
    }

    /// Whether the platform refused the credential (HTTP 401)
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected { status: 401, .. })
    }

    /// Whether this failure terminates the session
    ///
    /// Only a 401 whose message matches the fixed hard-rejection set
    /// qualifies. Transport errors, timeouts, and unrecognized 401s are
    /// transient.
    pub fn is_hard(&self) -> bool {
        self.logout_reason().is_some()
    }

    /// The logout reason for a hard failure, if this is one
    pub fn logout_reason(&self) -> Option<LogoutReason> {
        match self {
            AuthError::Rejected {
                status: 401,
                message,
            } => hard_rejection_reason(message),
            _ => None,
        }
    }
}
