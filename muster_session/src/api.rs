//! The platform's authentication surface
//!
//! The four REST operations the session lifecycle consumes: role-scoped
//! login, the identity check, credential refresh, and the keep-alive probe.

use async_trait::async_trait;

use crate::{error::AuthError, session::Role, token::BearerToken};

pub mod dto;
#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpAuthBackend;

/// An asynchronous client for the platform's authentication endpoints
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchanges credentials for a bearer token via `POST /auth/{role}/login`
    async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<dto::LoginResponse, AuthError>;

    /// Fetches the identity behind a token via `GET /auth/me`
    async fn me(&self, token: &BearerToken) -> Result<dto::MeResponse, AuthError>;

    /// Exchanges a token for a fresh one via `POST /auth/refresh`
    async fn refresh(&self, token: &BearerToken) -> Result<dto::RefreshResponse, AuthError>;

    /// Probes session liveness via `GET /auth/keep-alive`
    async fn keep_alive(&self, token: &BearerToken) -> Result<(), AuthError>;
}
