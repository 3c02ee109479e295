//! Middleware routing every platform request through the session lifecycle
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include [`BearerAuthMiddleware`] in the middleware stack to attach the
//! session's current credential to each outbound request, and layer
//! [`ExpiryRecoveryMiddleware`] outside it to recover from an expired
//! credential with a single-flight refresh and exactly one replay.
//!
//! If a request already has an `Authorization` header value by the time the
//! bearer middleware executes, the existing value is left in place, allowing
//! overrides to be specified as required. The middleware touches nothing but
//! the `Authorization` header; a multipart body keeps the content type and
//! boundary the transport chose for it.
//!
//! ```no_run
//! use muster_reqwest::{dispatcher_client, DispatcherConfig};
//! # use std::sync::Arc;
//! # use muster_session::{SessionControllerBuilder, cache::InMemoryCredentialCache};
//! #
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let backend: Arc<dyn muster_session::api::AuthBackend> = unimplemented!();
//! # let controller = SessionControllerBuilder::new(
//! #     backend,
//! #     Arc::new(InMemoryCredentialCache::new()),
//! # )
//! # .build();
//!
//! let client = dispatcher_client(DispatcherConfig::default(), controller.handle())?;
//!
//! let crew = client
//!     .get("https://api.example.com/api/crew")
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The bearer middleware can also be configured to attach the credential
//! only conditionally. By default it requires HTTPS; [`UnderApiRoot`] narrows
//! it to the platform's own API so that third-party targets, such as
//! presigned upload hosts, never see the credential. Predicates compose with
//! the combinators from the [`predicates`] crate.
//!
//! ```no_run
//! use muster_reqwest::{BearerAuthMiddleware, HttpsOnly, UnderApiRoot};
//! use predicates::prelude::PredicateBooleanExt;
//! # use std::sync::Arc;
//! # use muster_session::{SessionControllerBuilder, cache::InMemoryCredentialCache};
//! #
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # let backend: Arc<dyn muster_session::api::AuthBackend> = unimplemented!();
//! # let controller = SessionControllerBuilder::new(
//! #     backend,
//! #     Arc::new(InMemoryCredentialCache::new()),
//! # )
//! # .build();
//!
//! BearerAuthMiddleware::new(controller.handle())
//!     .with_predicate(HttpsOnly.and(UnderApiRoot::new(
//!         "https://api.example.com/api/".parse().unwrap(),
//!     )));
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, time::Duration};

use bytes::{BufMut, BytesMut};
use muster_session::{hard_rejection_reason, BearerToken, SessionHandle};
use predicates::{prelude::*, reflection};
use reqwest::{header, Request, Response, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next, Result};

/// Timeouts applied to the dispatch client
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// The deadline applied to every request
    ///
    /// Long-running transfers such as document uploads should override this
    /// per request with [`reqwest::RequestBuilder::timeout`]. A timeout is a
    /// transport failure: it propagates to the caller untouched and never
    /// affects the session.
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    /// Defaults to a 30 second request deadline
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Builds the authenticated dispatch client the rest of the application
/// routes its requests through
///
/// Expiry recovery wraps bearer attachment, so a replayed request passes
/// back through the attachment layer with the refreshed credential already
/// in place.
pub fn dispatcher_client(
    config: DispatcherConfig,
    session: SessionHandle,
) -> reqwest::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    Ok(ClientBuilder::new(client)
        .with(ExpiryRecoveryMiddleware::new(session.clone()))
        .with(BearerAuthMiddleware::new(session))
        .build())
}

fn bearer_header(token: &BearerToken) -> header::HeaderValue {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value =
        header::HeaderValue::from_maybe_shared(header_value).expect("only valid header bytes");
    value.set_sensitive(true);
    value
}

/// A middleware that injects the session's credential into outgoing requests
#[derive(Clone, Debug)]
pub struct BearerAuthMiddleware<P> {
    session: SessionHandle,
    predicate: P,
}

impl BearerAuthMiddleware<HttpsOnly> {
    /// Constructs a new middleware over a session handle
    ///
    /// By default, this middleware will only send the credential if the
    /// request is being sent via HTTPS. To change this behavior, provide a
    /// custom predicate with [`with_predicate()`][Self::with_predicate()].
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            predicate: HttpsOnly,
        }
    }

    /// Replaces the default predicate with a custom predicate
    pub fn with_predicate<P>(self, predicate: P) -> BearerAuthMiddleware<P> {
        BearerAuthMiddleware {
            session: self.session,
            predicate,
        }
    }
}

#[async_trait::async_trait]
impl<P> Middleware for BearerAuthMiddleware<P>
where
    P: Predicate<Request> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if self.predicate.eval(&req) {
            if let Some(token) = self.session.token() {
                req.headers_mut()
                    .entry(header::AUTHORIZATION)
                    .or_insert_with(|| bearer_header(&token));
            }
        }

        next.run(req, extensions).await
    }
}

/// Marks a request execution that has already been replayed once
#[derive(Clone, Copy, Debug)]
struct ReplayedOnce;

/// A middleware that recovers from an expired credential
///
/// Layered outside [`BearerAuthMiddleware`]. A success passes through
/// unchanged. On a 401 from the platform, the middleware refreshes the
/// credential through the session's single-flight gate and replays the
/// original request exactly once; the replay's outcome is returned without
/// further examination. Requests to the authentication endpoints themselves
/// are never replayed, and neither is a request whose body cannot be cloned.
///
/// When recovery is impossible (no credential held, or the refresh itself
/// fails), the original failure is classified by its server message. The
/// fixed hard-rejection set terminates the session; any other 401 propagates
/// with the session left in place for a later retry.
#[derive(Clone, Debug)]
pub struct ExpiryRecoveryMiddleware {
    session: SessionHandle,
}

impl ExpiryRecoveryMiddleware {
    /// Constructs a new middleware over a session handle
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    async fn settle_failure(&self, message: &str) {
        match hard_rejection_reason(message) {
            Some(reason) => {
                tracing::warn!(?reason, "credential rejected, ending session");
                self.session.force_logout(reason).await;
            }
            None => {
                tracing::debug!("unrecognized rejection, keeping session for a later retry");
            }
        }
    }
}

fn is_auth_endpoint(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.iter().position(|s| *s == "auth") {
        Some(idx) => matches!(
            &segments[idx + 1..],
            ["me"] | ["refresh"] | ["keep-alive"] | [_, "login"]
        ),
        None => false,
    }
}

fn rebuild_response(
    status: StatusCode,
    headers: header::HeaderMap,
    body: bytes::Bytes,
) -> Response {
    let mut rebuilt = http::Response::builder()
        .status(status)
        .body(body)
        .expect("a status taken from a response is valid");
    *rebuilt.headers_mut() = headers;
    rebuilt.into()
}

#[async_trait::async_trait]
impl Middleware for ExpiryRecoveryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let replay = req.try_clone();
        let path = req.url().path().to_owned();

        let resp = next.clone().run(req, extensions).await?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        if is_auth_endpoint(&path) {
            tracing::debug!(path = %path, "authentication endpoint rejected, not replaying");
            return Ok(resp);
        }

        if extensions.get::<ReplayedOnce>().is_some() {
            tracing::debug!(path = %path, "request already replayed once, propagating");
            return Ok(resp);
        }

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(reqwest_middleware::Error::Reqwest)?;
        let message = error_message(&body);

        if self.session.token().is_some() {
            match self.session.try_refresh().await {
                Ok(fresh) => {
                    if let Some(mut replay) = replay {
                        tracing::debug!(path = %path, "credential refreshed, replaying request");
                        replay.headers_mut().insert(
                            header::AUTHORIZATION,
                            bearer_header(&fresh.credential),
                        );
                        extensions.insert(ReplayedOnce);
                        return next.run(replay, extensions).await;
                    }

                    tracing::debug!(
                        path = %path,
                        "credential refreshed but request body cannot be replayed"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path,
                        error = %error,
                        "refresh failed while recovering a request"
                    );
                    self.settle_failure(&message).await;
                }
            }
        } else {
            self.settle_failure(&message).await;
        }

        Ok(rebuild_response(status, headers, body))
    }
}

fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

/// Only attach the credential if the request is being sent over HTTPS
#[derive(Clone, Copy, Debug)]
pub struct HttpsOnly;

impl Predicate<Request> for HttpsOnly {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().scheme() == "https"
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "scheme",
                    req.url().scheme().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for HttpsOnly {}
impl fmt::Display for HttpsOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheme is https")
    }
}

/// Only attach the credential if the request targets the platform's API root
#[derive(Clone, Debug)]
pub struct UnderApiRoot {
    root: Url,
}

impl UnderApiRoot {
    /// Construct a new predicate from the API root URL
    pub fn new(root: Url) -> Self {
        Self { root }
    }
}

impl Predicate<Request> for UnderApiRoot {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        let url = req.url();
        url.scheme() == self.root.scheme()
            && url.host_str() == self.root.host_str()
            && url.port_or_known_default() == self.root.port_or_known_default()
            && url.path().starts_with(self.root.path())
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "url",
                    req.url().to_string(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for UnderApiRoot {}
impl fmt::Display for UnderApiRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "url is under {}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;
    use muster_session::{
        api::{dto, AuthBackend},
        cache::InMemoryCredentialCache,
        AuthError, LogoutReason, Role, SessionController, SessionControllerBuilder,
    };
    use reqwest::Client;

    use super::*;

    /// An [`AuthBackend`] whose refresh outcomes are scripted per test
    #[derive(Default)]
    struct ScriptedBackend {
        refresh_script: Mutex<VecDeque<std::result::Result<&'static str, AuthError>>>,
        refresh_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn push_refresh_ok(&self, token: &'static str) {
            self.refresh_script.lock().unwrap().push_back(Ok(token));
        }

        fn push_refresh_err(&self, err: AuthError) {
            self.refresh_script.lock().unwrap().push_back(Err(err));
        }
    }

    #[async_trait]
    impl AuthBackend for ScriptedBackend {
        async fn login(
            &self,
            _role: Role,
            _email: &str,
            _password: &str,
        ) -> std::result::Result<dto::LoginResponse, AuthError> {
            Ok(dto::LoginResponse {
                token: BearerToken::from_static("t1"),
                user: serde_json::json!({ "id": 7 }),
            })
        }

        async fn me(
            &self,
            _token: &BearerToken,
        ) -> std::result::Result<dto::MeResponse, AuthError> {
            Err(AuthError::NoCredential)
        }

        async fn refresh(
            &self,
            _token: &BearerToken,
        ) -> std::result::Result<dto::RefreshResponse, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .refresh_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("t2"));
            outcome.map(|token| dto::RefreshResponse {
                token: BearerToken::from_static(token),
                user: serde_json::json!({ "id": 7 }),
                user_type: None,
            })
        }

        async fn keep_alive(&self, _token: &BearerToken) -> std::result::Result<(), AuthError> {
            Ok(())
        }
    }

    /// A terminal middleware that answers from a script and records what it saw
    #[derive(Default)]
    struct ScriptedResponder {
        script: Mutex<VecDeque<(u16, &'static str)>>,
        seen_authorization: Mutex<Vec<Option<String>>>,
        seen_content_type: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedResponder {
        fn push(&self, status: u16, body: &'static str) {
            self.script.lock().unwrap().push_back((status, body));
        }

        fn requests_seen(&self) -> usize {
            self.seen_authorization.lock().unwrap().len()
        }

        fn authorization_seen(&self) -> Vec<Option<String>> {
            self.seen_authorization.lock().unwrap().clone()
        }
    }

    fn header_text(req: &Request, name: header::HeaderName) -> Option<String> {
        req.headers()
            .get(name)
            .map(|v| v.to_str().expect("header was not valid UTF-8").to_owned())
    }

    #[async_trait]
    impl Middleware for ScriptedResponder {
        async fn handle(
            &self,
            req: Request,
            _: &mut http::Extensions,
            _: Next<'_>,
        ) -> Result<Response> {
            self.seen_authorization
                .lock()
                .unwrap()
                .push(header_text(&req, header::AUTHORIZATION));
            self.seen_content_type
                .lock()
                .unwrap()
                .push(header_text(&req, header::CONTENT_TYPE));

            let (status, body) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((200, "{}"));

            let response = http::Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body)
                .expect("scripted response is valid");
            Ok(response.into())
        }
    }

    struct Harness {
        backend: Arc<ScriptedBackend>,
        responder: Arc<ScriptedResponder>,
        controller: SessionController,
        client: ClientWithMiddleware,
    }

    async fn authenticated_harness() -> Harness {
        let harness = anonymous_harness().await;
        harness
            .controller
            .login(Role::Admin, "ops@example.com", "pw")
            .await
            .unwrap();
        harness
    }

    async fn anonymous_harness() -> Harness {
        let backend = Arc::new(ScriptedBackend::default());
        let responder = Arc::new(ScriptedResponder::default());
        let backend_object: Arc<dyn AuthBackend> = Arc::clone(&backend);
        let controller = SessionControllerBuilder::new(
            backend_object,
            Arc::new(InMemoryCredentialCache::new()),
        )
        .build();

        let client = ClientBuilder::new(Client::default())
            .with(ExpiryRecoveryMiddleware::new(controller.handle()))
            .with(BearerAuthMiddleware::new(controller.handle()))
            .with_arc(Arc::clone(&responder))
            .build();

        Harness {
            backend,
            responder,
            controller,
            client,
        }
    }

    mod bearer_attachment {
        use super::*;

        #[tokio::test]
        async fn attaches_the_session_credential_on_https_requests() {
            let harness = authenticated_harness().await;

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(
                harness.responder.authorization_seen(),
                vec![Some("Bearer t1".to_owned())]
            );
        }

        #[tokio::test]
        async fn leaves_an_existing_authorization_header_in_place() {
            let harness = authenticated_harness().await;

            harness
                .client
                .get("https://example.com/api/crew")
                .bearer_auth("overridden!")
                .send()
                .await
                .unwrap();

            assert_eq!(
                harness.responder.authorization_seen(),
                vec![Some("Bearer overridden!".to_owned())]
            );
        }

        #[tokio::test]
        async fn sends_nothing_when_no_credential_is_held() {
            let harness = anonymous_harness().await;

            harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(harness.responder.authorization_seen(), vec![None]);
        }

        #[tokio::test]
        async fn does_not_attach_over_plain_http() {
            let harness = authenticated_harness().await;

            harness
                .client
                .get("http://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(harness.responder.authorization_seen(), vec![None]);
        }

        #[tokio::test]
        async fn leaves_the_content_type_untouched() {
            let harness = authenticated_harness().await;

            harness
                .client
                .post("https://example.com/api/documents")
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=boundary-7",
                )
                .body("--boundary-7--")
                .send()
                .await
                .unwrap();

            assert_eq!(
                harness.responder.seen_content_type.lock().unwrap().clone(),
                vec![Some("multipart/form-data; boundary=boundary-7".to_owned())]
            );
            assert_eq!(
                harness.responder.authorization_seen(),
                vec![Some("Bearer t1".to_owned())]
            );
        }
    }

    mod expiry_recovery {
        use super::*;

        #[tokio::test]
        async fn refreshes_and_replays_exactly_once_on_a_401() {
            let harness = authenticated_harness().await;
            harness
                .responder
                .push(401, r#"{"message": "Token has expired"}"#);
            harness.responder.push(200, r#"{"ok": true}"#);
            harness.backend.push_refresh_ok("t2");

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(
                harness.responder.authorization_seen(),
                vec![
                    Some("Bearer t1".to_owned()),
                    Some("Bearer t2".to_owned()),
                ]
            );
            assert_eq!(harness.backend.refresh_calls.load(Ordering::SeqCst), 1);
            assert_eq!(
                harness.controller.handle().token().unwrap().as_str(),
                "t2"
            );
        }

        #[tokio::test]
        async fn a_second_401_propagates_without_another_replay() {
            let harness = authenticated_harness().await;
            harness
                .responder
                .push(401, r#"{"message": "Token has expired"}"#);
            harness
                .responder
                .push(401, r#"{"message": "Token has expired"}"#);
            harness.backend.push_refresh_ok("t2");

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(harness.responder.requests_seen(), 2);
            assert_eq!(harness.backend.refresh_calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn authentication_endpoints_are_never_replayed() {
            let harness = authenticated_harness().await;
            harness
                .responder
                .push(401, r#"{"message": "Token has expired"}"#);

            let resp = harness
                .client
                .post("https://example.com/api/auth/refresh")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(harness.responder.requests_seen(), 1);
            assert_eq!(harness.backend.refresh_calls.load(Ordering::SeqCst), 0);
            assert_eq!(
                harness.controller.handle().token().unwrap().as_str(),
                "t1"
            );
        }

        #[tokio::test]
        async fn refresh_failure_with_a_hard_rejection_ends_the_session() {
            let harness = authenticated_harness().await;
            let mut notices = harness.controller.logout_notices();
            harness
                .responder
                .push(401, r#"{"message": "Token has expired"}"#);
            harness
                .backend
                .push_refresh_err(AuthError::Rejected {
                    status: 401,
                    message: "Token has expired".to_owned(),
                });

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert!(harness.controller.handle().token().is_none());

            let notice = notices.recv().await.unwrap();
            assert_eq!(notice.reason, LogoutReason::TokenExpired);
            assert_eq!(notice.portal, muster_session::Portal::Admin);
        }

        #[tokio::test]
        async fn refresh_failure_with_an_unrecognized_401_keeps_the_session() {
            let harness = authenticated_harness().await;
            let mut notices = harness.controller.logout_notices();
            harness
                .responder
                .push(401, r#"{"message": "account suspended"}"#);
            harness
                .backend
                .push_refresh_err(AuthError::transport(std::io::Error::other(
                    "gateway unreachable",
                )));

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                resp.json::<serde_json::Value>().await.unwrap()["message"],
                "account suspended"
            );
            assert_eq!(
                harness.controller.handle().token().unwrap().as_str(),
                "t1"
            );
            assert!(matches!(
                notices.try_recv(),
                Err(tokio::sync::broadcast::error::TryRecvError::Empty)
            ));
        }

        #[tokio::test]
        async fn hard_rejection_without_a_credential_still_announces_logout() {
            let harness = anonymous_harness().await;
            let mut notices = harness.controller.logout_notices();
            harness
                .responder
                .push(401, r#"{"message": "No token provided"}"#);

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(harness.backend.refresh_calls.load(Ordering::SeqCst), 0);

            let notice = notices.recv().await.unwrap();
            assert_eq!(notice.reason, LogoutReason::TokenMissing);
            assert_eq!(notice.portal, muster_session::Portal::Client);
        }

        #[tokio::test]
        async fn non_authorization_failures_pass_through_unchanged() {
            let harness = authenticated_harness().await;
            harness
                .responder
                .push(500, r#"{"message": "storage offline"}"#);

            let resp = harness
                .client
                .get("https://example.com/api/crew")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(harness.responder.requests_seen(), 1);
            assert_eq!(harness.backend.refresh_calls.load(Ordering::SeqCst), 0);
        }
    }

    mod auth_endpoint_matching {
        use super::*;

        #[test]
        fn recognizes_the_authentication_surface() {
            assert!(is_auth_endpoint("/api/auth/me"));
            assert!(is_auth_endpoint("/api/auth/refresh"));
            assert!(is_auth_endpoint("/api/auth/keep-alive"));
            assert!(is_auth_endpoint("/api/auth/admin/login"));
            assert!(is_auth_endpoint("/api/auth/client/login"));
            assert!(is_auth_endpoint("/auth/me"));
        }

        #[test]
        fn leaves_the_rest_of_the_api_alone() {
            assert!(!is_auth_endpoint("/api/crew"));
            assert!(!is_auth_endpoint("/api/crew/7/documents"));
            assert!(!is_auth_endpoint("/api/authors"));
            assert!(!is_auth_endpoint("/api/auth/sessions/7"));
        }
    }

    mod under_api_root_predicate {
        use super::*;

        fn request(url: &str) -> Request {
            Request::new(reqwest::Method::GET, url.parse().unwrap())
        }

        #[test]
        fn matches_requests_under_the_root() {
            let predicate = UnderApiRoot::new("https://api.example.com/api/".parse().unwrap());
            let result = predicate.find_case(true, &request("https://api.example.com/api/crew"));
            assert!(result.is_none());
        }

        #[test]
        fn rejects_other_hosts() {
            let predicate = UnderApiRoot::new("https://api.example.com/api/".parse().unwrap());
            let result = predicate.find_case(
                false,
                &request("https://uploads.example.net/bucket/object?signature=abc"),
            );
            assert!(result.is_none());
        }

        #[test]
        fn rejects_paths_outside_the_root() {
            let predicate = UnderApiRoot::new("https://api.example.com/api/".parse().unwrap());
            let result = predicate.find_case(false, &request("https://api.example.com/metrics"));
            assert!(result.is_none());
        }
    }
}
