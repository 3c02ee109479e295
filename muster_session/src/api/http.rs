//! The reqwest-backed authentication client

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{dto, AuthBackend};
use crate::{error::AuthError, session::Role, token::BearerToken};

/// The default per-request deadline for authentication calls
///
/// Authentication bodies are small; anything slower than this is treated as a
/// transient transport failure.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`AuthBackend`] speaking to the platform's REST API
#[derive(Clone, Debug)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    api_root: reqwest::Url,
    timeout: Duration,
}

impl HttpAuthBackend {
    /// Constructs a new client against the given API root
    ///
    /// `api_root` must be a base URL (`https://…/api/`); endpoint segments are
    /// appended beneath it.
    pub fn new(client: reqwest::Client, api_root: reqwest::Url) -> Self {
        Self {
            client,
            api_root,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
        let body = read_success_body(resp).await?;
        serde_json::from_slice(&body).map_err(|err| AuthError::Decode(Arc::new(err)))
    }
}

async fn read_success_body(resp: reqwest::Response) -> Result<bytes::Bytes, AuthError> {
    let status = resp.status();

    tracing::debug!(
        response.status = status.as_u16(),
        "received response from platform"
    );

    let body = resp.bytes().await.map_err(AuthError::transport)?;

    if status.is_success() {
        return Ok(body);
    }

    let message = match serde_json::from_slice::<dto::ErrorBody>(&body) {
        Ok(envelope) if !envelope.message.is_empty() => envelope.message,
        _ => String::from_utf8_lossy(&body).into_owned(),
    };

    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[tracing::instrument(skip(self, password, role), fields(role = role.as_str()))]
    async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<dto::LoginResponse, AuthError> {
        let resp = self
            .client
            .post(self.endpoint(&["auth", role.as_str(), "login"]))
            .timeout(self.timeout)
            .json(&dto::LoginRequest { email, password })
            .send()
            .await
            .map_err(AuthError::transport)?;

        Self::decode(resp).await
    }

    #[tracing::instrument(skip_all)]
    async fn me(&self, token: &BearerToken) -> Result<dto::MeResponse, AuthError> {
        let resp = self
            .client
            .get(self.endpoint(&["auth", "me"]))
            .timeout(self.timeout)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(AuthError::transport)?;

        Self::decode(resp).await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, token: &BearerToken) -> Result<dto::RefreshResponse, AuthError> {
        let resp = self
            .client
            .post(self.endpoint(&["auth", "refresh"]))
            .timeout(self.timeout)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(AuthError::transport)?;

        Self::decode(resp).await
    }

    #[tracing::instrument(skip_all)]
    async fn keep_alive(&self, token: &BearerToken) -> Result<(), AuthError> {
        let resp = self
            .client
            .get(self.endpoint(&["auth", "keep-alive"]))
            .timeout(self.timeout)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(AuthError::transport)?;

        read_success_body(resp).await.map(|_| ())
    }
}
