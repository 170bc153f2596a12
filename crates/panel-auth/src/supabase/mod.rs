//! [`AuthAuthority`] backed by Supabase auth (GoTrue).
//!
//! Browser sign-in uses the PKCE flow with a loopback callback:
//!
//! 1. Start `tiny_http` on `127.0.0.1:0`
//! 2. Open the browser at `/authorize` with a S256 challenge and a `state` nonce
//! 3. Return immediately; a background task waits for `?code=` (in
//!    `spawn_blocking`, since `tiny_http::recv` blocks)
//! 4. Exchange the code, persist the session, publish `SIGNED_IN`
//!
//! If any step after 2 fails (timeout, denied consent, state mismatch,
//! rejected code), the task publishes [`AuthNotice::SignInFailed`] instead.
//!
//! An explicit `redirect_to` skips the loopback and hands the callback to
//! whatever app owns that address.

pub mod api;
pub mod callback;
pub mod pkce;
pub mod session_store;

use std::sync::Arc;
use std::time::Duration;

use panel_config::{AuthConfig, SupabaseConfig};
use panel_core::{AuthChangeEvent, OAuthProvider, Session, SessionChange};
use thiserror::Error;
use tokio::sync::broadcast;

pub use api::AuthApi;
pub use callback::LoopbackServer;
pub use pkce::Pkce;
pub use session_store::{SessionSource, SessionStore};

use crate::authority::{AuthAuthority, AuthNotice, ChangeFeed, OAuthRedirect, SignInOptions};
use crate::error::BackendError;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected auth API response: {0}")]
    Decode(String),

    #[error("session store error: {0}")]
    SessionStore(String),

    #[error("browser login failed: {0}")]
    BrowserFlow(String),
}

impl SupabaseError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The backend refused the credentials; retrying will not help.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }

    /// The access token is no longer accepted.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

impl From<SupabaseError> for BackendError {
    fn from(error: SupabaseError) -> Self {
        let status = error.status();
        let message = match error {
            SupabaseError::Api { message, .. } => message,
            other => other.to_string(),
        };
        Self { message, status }
    }
}

/// Opens a URL in the user's browser.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Timing knobs for the browser flow and session refresh.
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub callback_timeout: Duration,
    pub refresh_buffer_secs: i64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for FlowSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            callback_timeout: config.callback_timeout(),
            refresh_buffer_secs: config.refresh_buffer_secs,
        }
    }
}

/// Supabase-backed session authority. Clones share the session feed.
#[derive(Clone)]
pub struct SupabaseAuthority {
    inner: Arc<Shared>,
}

struct Shared {
    api: AuthApi,
    store: SessionStore,
    feed: ChangeFeed,
    settings: FlowSettings,
    launcher: BrowserLauncher,
}

impl SupabaseAuthority {
    pub fn new(api: AuthApi, store: SessionStore, settings: FlowSettings) -> Self {
        let launcher: BrowserLauncher = Arc::new(|url: &str| open::that(url));
        Self::with_launcher(api, store, settings, launcher)
    }

    pub fn with_launcher(
        api: AuthApi,
        store: SessionStore,
        settings: FlowSettings,
        launcher: BrowserLauncher,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                api,
                store,
                feed: ChangeFeed::default(),
                settings,
                launcher,
            }),
        }
    }

    /// Authority for the configured project, persisting to the system store.
    #[must_use]
    pub fn from_config(supabase: &SupabaseConfig, auth: &AuthConfig) -> Self {
        Self::new(
            AuthApi::new(supabase.auth_url(), &supabase.anon_key),
            SessionStore::system(),
            FlowSettings::from(auth),
        )
    }

    /// Where the persisted session currently lives, for status display.
    #[must_use]
    pub fn session_source(&self) -> Option<SessionSource> {
        self.inner.store.source()
    }

    fn start_sign_in(
        &self,
        provider: OAuthProvider,
        options: SignInOptions,
    ) -> Result<OAuthRedirect, SupabaseError> {
        let shared = &self.inner;

        if let Some(redirect_to) = options.redirect_to {
            let url = shared.api.authorize_url(provider, Some(&redirect_to), None);
            shared.launch(&url);
            return Ok(OAuthRedirect { provider, url });
        }

        let pkce = Pkce::generate()?;
        let server = LoopbackServer::bind(pkce::state_nonce()?)?;
        let url = shared
            .api
            .authorize_url(provider, Some(&server.redirect_url()), Some(&pkce));
        shared.launch(&url);

        let task_shared = Arc::clone(shared);
        tokio::spawn(async move {
            if let Err(error) = task_shared.complete_sign_in(server, pkce.verifier).await {
                tracing::warn!(%provider, %error, "browser sign-in did not complete");
                task_shared
                    .feed
                    .publish_sign_in_failure(provider, BackendError::from(error));
            }
        });

        Ok(OAuthRedirect { provider, url })
    }
}

impl Shared {
    fn launch(&self, url: &str) {
        if let Err(error) = (self.launcher)(url) {
            tracing::warn!(%error, url, "failed to open browser; open the URL manually");
        }
    }

    fn publish(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.feed.publish(SessionChange::new(event, session));
    }

    async fn complete_sign_in(&self, server: LoopbackServer, verifier: String) -> Result<(), SupabaseError> {
        let timeout = self.settings.callback_timeout;
        let code = tokio::task::spawn_blocking(move || server.wait_for_code(timeout))
            .await
            .map_err(|e| SupabaseError::BrowserFlow(format!("spawn_blocking join: {e}")))??;

        let session = self.api.exchange_code(&code, &verifier).await?;
        self.store.save(&session)?;
        tracing::info!(user_id = %session.user.id, "browser sign-in completed");
        self.publish(AuthChangeEvent::SignedIn, Some(session));
        Ok(())
    }

    /// Drop the local session and tell listeners.
    fn forget(&self) -> Result<(), SupabaseError> {
        self.store.delete()?;
        self.publish(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    /// Stored session, refreshed when near expiry and re-validated against
    /// `/user`.
    async fn current_session(&self) -> Result<Option<Session>, SupabaseError> {
        let Some(mut session) = self.store.load() else {
            return Ok(None);
        };

        if session.is_near_expiry(self.settings.refresh_buffer_secs) {
            if session.refresh_token.is_empty() {
                tracing::info!("stored session expired without a refresh token");
                self.forget()?;
                return Ok(None);
            }
            match self.api.refresh(&session.refresh_token).await {
                Ok(fresh) => {
                    self.store.save(&fresh)?;
                    tracing::debug!(user_id = %fresh.user.id, "session refreshed");
                    self.publish(AuthChangeEvent::TokenRefreshed, Some(fresh.clone()));
                    session = fresh;
                }
                Err(error) if error.is_rejection() => {
                    tracing::info!(%error, "refresh token rejected; signing out locally");
                    self.forget()?;
                    return Ok(None);
                }
                Err(error) => return Err(error),
            }
        }

        match self.api.get_user(&session.access_token).await {
            Ok(user) => {
                if user != session.user {
                    session.user = user;
                    self.store.save(&session)?;
                    self.publish(AuthChangeEvent::UserUpdated, Some(session.clone()));
                }
                Ok(Some(session))
            }
            Err(error) if error.is_unauthorized() => {
                tracing::info!(%error, "stored session no longer valid");
                self.forget()?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn sign_out(&self) -> Result<(), SupabaseError> {
        if let Some(session) = self.store.load() {
            match self.api.logout(&session.access_token).await {
                Ok(()) => {}
                // Already revoked server-side.
                Err(error) if matches!(error.status(), Some(401 | 403 | 404)) => {
                    tracing::debug!(%error, "session already gone upstream");
                }
                Err(error) => return Err(error),
            }
        }
        self.forget()
    }
}

impl AuthAuthority for SupabaseAuthority {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.inner.current_session().await?)
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        options: SignInOptions,
    ) -> Result<OAuthRedirect, BackendError> {
        Ok(self.start_sign_in(provider, options)?)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        Ok(self.inner.sign_out().await?)
    }

    fn on_session_change(&self) -> broadcast::Receiver<AuthNotice> {
        self.inner.feed.subscribe()
    }
}
