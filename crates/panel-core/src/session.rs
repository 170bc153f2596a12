use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::AuthChangeEvent;
use crate::user::User;

/// A backend-issued session: proof that `user` is currently authenticated.
///
/// Tokens are opaque here. Only the authority adapter reads or persists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access-token expiry, as unix seconds on the wire.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schemars(with = "Option<i64>")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Upstream provider token, when the backend forwards it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
    pub user: User,
}

impl Session {
    /// Whether the access token is expired or expires within `buffer_secs`.
    ///
    /// A session without a known expiry is never considered near expiry.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at <= Utc::now() + chrono::TimeDelta::seconds(buffer_secs)
        })
    }
}

/// One push notification from the auth backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    #[must_use]
    pub const fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    /// The user carried by this change, if any.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}
