//! The auth-backend capability consumed by the session observer.

use std::future::Future;

use panel_core::{OAuthProvider, Session, SessionChange};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::BackendError;

/// Buffered change notifications per listener before it starts lagging.
pub const DEFAULT_FEED_CAPACITY: usize = 32;

/// Options forwarded with an OAuth sign-in request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInOptions {
    /// Where the provider should send the browser after consent.
    pub redirect_to: Option<String>,
}

/// A started OAuth flow: the URL the browser was sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthRedirect {
    pub provider: OAuthProvider,
    pub url: String,
}

/// Something an authority pushes to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthNotice {
    /// The backend session changed.
    Changed(SessionChange),
    /// A redirect sign-in that had already started ended without a session.
    SignInFailed {
        provider: OAuthProvider,
        error: BackendError,
    },
}

/// External session authority.
///
/// Request/response operations are async and may fail with [`BackendError`].
/// Push notifications are delivered through [`Self::on_session_change`], which
/// hands out a fresh receiver per listener; dropping it unsubscribes.
pub trait AuthAuthority: Send + Sync + 'static {
    /// The session the backend currently holds, if any.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Start the OAuth redirect flow for `provider`.
    ///
    /// Success means the browser has been pointed at the provider. The
    /// resulting session arrives later as a change notification; a flow that
    /// fails after this returns is reported as [`AuthNotice::SignInFailed`].
    fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        options: SignInOptions,
    ) -> impl Future<Output = Result<OAuthRedirect, BackendError>> + Send;

    /// Invalidate the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Listen for session changes and sign-in failures from now on.
    fn on_session_change(&self) -> broadcast::Receiver<AuthNotice>;
}

/// Fan-out of session notices to every listener, in publish order.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<AuthNotice>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver `change` to every current listener. Returns how many received it.
    pub fn publish(&self, change: SessionChange) -> usize {
        tracing::debug!(
            event = %change.event,
            user_id = change.user().map(|u| u.id.as_str()),
            "publishing session change",
        );
        self.tx.send(AuthNotice::Changed(change)).unwrap_or(0)
    }

    /// Report that a started sign-in for `provider` will not complete.
    pub fn publish_sign_in_failure(&self, provider: OAuthProvider, error: BackendError) -> usize {
        tracing::debug!(%provider, %error, "publishing sign-in failure");
        self.tx
            .send(AuthNotice::SignInFailed { provider, error })
            .unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthNotice> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
