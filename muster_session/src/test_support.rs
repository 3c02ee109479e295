//! Scripted doubles shared by the lifecycle tests

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{dto, AuthBackend};
use crate::error::AuthError;
use crate::session::Role;
use crate::token::BearerToken;

pub(crate) fn transport_error(message: &str) -> AuthError {
    AuthError::transport(std::io::Error::other(message.to_owned()))
}

pub(crate) fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Rejected {
        status,
        message: message.to_owned(),
    }
}

pub(crate) fn subject() -> serde_json::Value {
    serde_json::json!({ "id": 7, "name": "A. Mariner" })
}

/// Lets spawned tasks run to their next await point
pub(crate) async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

/// An [`AuthBackend`] driven by per-endpoint response scripts
///
/// Unscripted calls fail with a transport error, except keep-alive, which
/// succeeds by default. Optional release gates park a call until the test
/// lets it proceed.
#[derive(Default)]
pub(crate) struct FakeBackend {
    login_responses: Mutex<VecDeque<Result<dto::LoginResponse, AuthError>>>,
    me_responses: Mutex<VecDeque<Result<dto::MeResponse, AuthError>>>,
    refresh_responses: Mutex<VecDeque<Result<dto::RefreshResponse, AuthError>>>,
    keep_alive_responses: Mutex<VecDeque<Result<(), AuthError>>>,
    me_release: Mutex<Option<Arc<Notify>>>,
    refresh_release: Mutex<Option<Arc<Notify>>>,
    pub login_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub keep_alive_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn push_login_ok(&self, token: &'static str) {
        self.login_responses
            .lock()
            .unwrap()
            .push_back(Ok(dto::LoginResponse {
                token: BearerToken::from_static(token),
                user: subject(),
            }));
    }

    pub fn push_login_err(&self, err: AuthError) {
        self.login_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_me_ok(&self, role: Role) {
        self.me_responses
            .lock()
            .unwrap()
            .push_back(Ok(dto::MeResponse {
                user: subject(),
                user_type: role,
            }));
    }

    pub fn push_me_err(&self, err: AuthError) {
        self.me_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_refresh_ok(&self, token: &'static str, user_type: Option<Role>) {
        self.refresh_responses
            .lock()
            .unwrap()
            .push_back(Ok(dto::RefreshResponse {
                token: BearerToken::from_static(token),
                user: subject(),
                user_type,
            }));
    }

    pub fn push_refresh_err(&self, err: AuthError) {
        self.refresh_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_keep_alive_err(&self, err: AuthError) {
        self.keep_alive_responses.lock().unwrap().push_back(Err(err));
    }

    /// Parks the next `me` calls until the returned gate is notified
    pub fn gate_me(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.me_release.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Parks the next `refresh` calls until the returned gate is notified
    pub fn gate_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_release.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn login(
        &self,
        _role: Role,
        _email: &str,
        _password: &str,
    ) -> Result<dto::LoginResponse, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(transport_error("unscripted login call")))
    }

    async fn me(&self, _token: &BearerToken) -> Result<dto::MeResponse, AuthError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let release = self.me_release.lock().unwrap().clone();
        if let Some(gate) = release {
            gate.notified().await;
        }
        self.me_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(transport_error("unscripted me call")))
    }

    async fn refresh(&self, _token: &BearerToken) -> Result<dto::RefreshResponse, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let release = self.refresh_release.lock().unwrap().clone();
        if let Some(gate) = release {
            gate.notified().await;
        }
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(transport_error("unscripted refresh call")))
    }

    async fn keep_alive(&self, _token: &BearerToken) -> Result<(), AuthError> {
        self.keep_alive_calls.fetch_add(1, Ordering::SeqCst);
        self.keep_alive_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
