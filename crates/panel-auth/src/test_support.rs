//! In-process fakes for the auth backend and the durable store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use panel_core::{
    AuthChangeEvent, OAuthProvider, Session, SessionChange, StoreError, User, UserMetadata,
    UserRecord, UserStore,
};
use tokio::sync::{Notify, broadcast};

use crate::authority::{AuthAuthority, AuthNotice, ChangeFeed, OAuthRedirect, SignInOptions};
use crate::error::BackendError;

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn user(id: &str, email: &str, full_name: Option<&str>) -> User {
    User {
        id: id.into(),
        email: email.into(),
        user_metadata: UserMetadata {
            full_name: full_name.map(str::to_string),
            ..Default::default()
        },
    }
}

pub fn session_for(user: User) -> Session {
    Session {
        access_token: format!("access-{}", user.id),
        refresh_token: format!("refresh-{}", user.id),
        expires_at: Some(Utc::now() + chrono::TimeDelta::hours(1)),
        provider_token: None,
        user,
    }
}

pub fn signed_in(user: User) -> SessionChange {
    SessionChange::new(AuthChangeEvent::SignedIn, Some(session_for(user)))
}

pub fn signed_out() -> SessionChange {
    SessionChange::new(AuthChangeEvent::SignedOut, None)
}

// ---------------------------------------------------------------------------
// FakeAuthority
// ---------------------------------------------------------------------------

/// Scriptable auth backend. Every call is recorded by name.
pub struct FakeAuthority {
    session: Mutex<Result<Option<Session>, BackendError>>,
    sign_in: Mutex<Result<(), BackendError>>,
    sign_out: Mutex<Result<(), BackendError>>,
    /// When set, `get_session` parks until the gate is notified.
    session_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    pub feed: ChangeFeed,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self {
            session: Mutex::new(Ok(None)),
            sign_in: Mutex::new(Ok(())),
            sign_out: Mutex::new(Ok(())),
            session_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            feed: ChangeFeed::default(),
        }
    }
}

impl FakeAuthority {
    pub fn with_session(session: Option<Session>) -> Self {
        let fake = Self::default();
        *fake.session.lock().unwrap() = Ok(session);
        fake
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = Ok(session);
    }

    pub fn fail_session(&self, message: &str) {
        *self.session.lock().unwrap() = Err(BackendError::new(message));
    }

    pub fn fail_sign_in(&self, message: &str) {
        *self.sign_in.lock().unwrap() = Err(BackendError::new(message));
    }

    pub fn reset_sign_in(&self) {
        *self.sign_in.lock().unwrap() = Ok(());
    }

    pub fn fail_sign_out(&self, message: &str) {
        *self.sign_out.lock().unwrap() = Err(BackendError::new(message));
    }

    /// Make `get_session` wait for the returned gate.
    pub fn gate_session(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.session_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn push(&self, change: SessionChange) -> usize {
        self.feed.publish(change)
    }

    /// Report that the browser half of a sign-in failed.
    pub fn fail_redirect(&self, provider: OAuthProvider, message: &str) -> usize {
        self.feed.publish_sign_in_failure(provider, BackendError::new(message))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl AuthAuthority for FakeAuthority {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.record("get_session");
        let gate = self.session_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.session.lock().unwrap().clone()
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        options: SignInOptions,
    ) -> Result<OAuthRedirect, BackendError> {
        self.record(format!("sign_in:{provider}"));
        self.sign_in.lock().unwrap().clone()?;
        let redirect_to = options.redirect_to.unwrap_or_default();
        Ok(OAuthRedirect {
            provider,
            url: format!(
                "https://auth.test/authorize?provider={provider}&redirect_to={redirect_to}"
            ),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.record("sign_out");
        self.sign_out.lock().unwrap().clone()
    }

    fn on_session_change(&self) -> broadcast::Receiver<AuthNotice> {
        self.feed.subscribe()
    }
}

// ---------------------------------------------------------------------------
// RecordingStore
// ---------------------------------------------------------------------------

/// Upsert store that keeps rows in memory and logs every write.
#[derive(Default)]
pub struct RecordingStore {
    rows: Mutex<HashMap<String, UserRecord>>,
    writes: Mutex<Vec<(String, UserRecord)>>,
    failure: Mutex<Option<StoreError>>,
}

impl RecordingStore {
    pub fn fail_with(&self, failure: Option<StoreError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn writes(&self) -> Vec<(String, UserRecord)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn records(&self) -> HashMap<String, UserRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Poll until at least `count` writes were attempted.
    pub async fn wait_for_writes(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.writes.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for mirror writes");
    }
}

impl UserStore for RecordingStore {
    async fn upsert(&self, table: &str, record: &UserRecord) -> Result<(), StoreError> {
        self.writes
            .lock()
            .unwrap()
            .push((table.to_string(), record.clone()));
        if let Some(failure) = self.failure.lock().unwrap().clone() {
            return Err(failure);
        }
        self.rows
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockServer
// ---------------------------------------------------------------------------

/// One request seen by [`MockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

/// Local HTTP server that answers with canned `(status, body)` pairs, in
/// order, and records what it received.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn start(responses: Vec<(u16, &str)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        std::thread::spawn(move || {
            for (status, body) in responses {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(10)) else {
                    return;
                };
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let mut recorded_request = RecordedRequest {
                    method: request.method().as_str().to_string(),
                    url: request.url().to_string(),
                    apikey: header("apikey"),
                    authorization: header("Authorization"),
                    body: String::new(),
                };
                std::io::Read::read_to_string(request.as_reader(), &mut recorded_request.body)
                    .unwrap();
                recorded.lock().unwrap().push(recorded_request);

                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes("Content-Type", "application/json").unwrap(),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}/auth/v1"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
