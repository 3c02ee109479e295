//! Session and bearer-token lifecycle management for the Muster crewing
//! platform
//!
//! The platform issues an opaque bearer credential at login and expects
//! clients to keep it alive across long staffing-office sessions. This crate
//! owns that lifecycle so the rest of an application never thinks about it:
//! it restores a persisted session at startup, refreshes the credential in
//! the background, funnels every refresh trigger through a single-flight
//! gate, and announces unrecoverable logouts on a process-wide channel.
//!
//! The pieces, from the bottom up:
//!
//! * [`CredentialStore`]: the single source of truth for the current
//!   credential and identity, replaced atomically as one value.
//! * [`cache`]: best-effort durable persistence of the credential (one
//!   `token` value, written on login and refresh, removed on logout).
//! * [`api`]: the platform's four authentication endpoints behind the
//!   [`AuthBackend`](api::AuthBackend) seam.
//! * [`RefreshGate`]: the single-flight guard: however many timers and
//!   retries ask at once, one refresh request is sent and everyone shares
//!   its outcome.
//! * [`RefreshScheduler`]: the three background interval tasks (liveness
//!   ping, routine refresh, frequent defensive refresh).
//! * [`broadcast`]: the logout publish/subscribe channel that lets the
//!   request layer end a session without a reference to the controller.
//! * [`SessionController`]: what applications hold: bootstrap, login,
//!   refresh, logout, and a watchable [`SessionState`].
//!
//! # Getting started
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use muster_session::{
//!     cache::FileCredentialCache, HttpAuthBackend, Role, SessionControllerBuilder,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpAuthBackend::new(
//!     reqwest::Client::new(),
//!     "https://api.example.com/api/".parse()?,
//! );
//! let cache = FileCredentialCache::new(".muster-credentials.json".into());
//!
//! let controller = SessionControllerBuilder::new(Arc::new(backend), Arc::new(cache)).build();
//!
//! let state = controller.bootstrap().await;
//! if state.identity.is_none() {
//!     controller
//!         .login(Role::Admin, "ops@example.com", "secret")
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Requests outside the authentication surface should go through the
//! `muster_reqwest` middleware stack, which reads the same store via
//! [`SessionHandle`] and replays a request once after recovering from an
//! expired credential.
//!
//! # Features
//!
//! The following features are supported by this crate, all of which are
//! enabled by default:
//!
//! * `http`: Provides [`HttpAuthBackend`], the reqwest implementation of the
//!   authentication endpoints.
//! * `file`: Provides [`FileCredentialCache`](cache::FileCredentialCache),
//!   credential persistence on the local filesystem.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod api;
pub mod broadcast;
pub mod cache;
mod controller;
mod error;
mod refresh;
mod scheduler;
mod session;
mod store;
#[cfg(test)]
pub(crate) mod test_support;
mod token;

#[cfg(feature = "http")]
pub use api::HttpAuthBackend;
pub use broadcast::{LogoutBroadcast, LogoutNotice, ReauthSink};
pub use controller::{SessionController, SessionControllerBuilder, SessionHandle};
pub use error::{hard_rejection_reason, AuthError, LogoutReason};
pub use refresh::RefreshGate;
pub use scheduler::{RefreshScheduler, SchedulerConfig};
pub use session::{Identity, Portal, Role, Session, SessionState, UnknownRole};
pub use store::CredentialStore;
pub use token::{BearerToken, EmptyToken};
