use panel_core::StoreError;
use serde::Deserialize;
use thiserror::Error;

/// Failure reported by the auth backend for one request.
///
/// Deserializes from the `{ "message": "..." }` payloads backend SDKs hand out.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    /// HTTP status, when the failure came from an HTTP response.
    #[serde(default)]
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }
}

/// Everything the session observer and identity mirror can fail with.
///
/// None of these are fatal: the first three become a user-facing message in
/// `UiAuthState::error`, mirror failures are only logged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to fetch current session: {0}")]
    SessionFetch(BackendError),

    #[error("failed to start OAuth sign-in: {0}")]
    OAuthStart(BackendError),

    #[error("sign out failed: {0}")]
    SignOut(BackendError),

    #[error("identity mirror write failed: {0}")]
    MirrorWrite(#[from] StoreError),
}

impl AuthError {
    /// Message shown on the login panel, if this error has a UI surface.
    #[must_use]
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::SessionFetch(_) => Some("Failed to load your session."),
            Self::OAuthStart(_) => Some("Failed to log in. Please try again."),
            Self::SignOut(_) => Some("Failed to log out. Please try again."),
            Self::MirrorWrite(_) => None,
        }
    }
}
