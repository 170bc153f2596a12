//! UI-facing auth state and the login panel's state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::user::User;

/// What the login panel renders: who is signed in, whether a request is in
/// flight, and the last user-facing error.
///
/// Derived, never persisted. Lives only as long as the mounted view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UiAuthState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl UiAuthState {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

// ---------------------------------------------------------------------------
// AuthPhase
// ---------------------------------------------------------------------------

/// Phase of one login view.
///
/// ```text
/// uninitialized → loading → logged_out
///                         → logged_in
///                         → errored
/// logged_out → loading (sign in)   → errored (or redirect away)
/// logged_in  → loading (sign out)  → logged_out | errored
/// logged_out ⇄ logged_in           (change notifications)
/// errored    → loading | logged_out | logged_in
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Uninitialized,
    Loading,
    LoggedOut,
    LoggedIn,
    Errored,
}

impl AuthPhase {
    /// Phase of an initialized view holding `state`.
    #[must_use]
    pub const fn of(state: &UiAuthState) -> Self {
        if state.is_loading {
            Self::Loading
        } else if state.error.is_some() {
            Self::Errored
        } else if state.user.is_some() {
            Self::LoggedIn
        } else {
            Self::LoggedOut
        }
    }

    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Uninitialized => &[Self::Loading],
            Self::Loading => &[Self::LoggedOut, Self::LoggedIn, Self::Errored],
            Self::LoggedOut => &[Self::Loading, Self::LoggedIn],
            Self::LoggedIn => &[Self::Loading, Self::LoggedOut],
            Self::Errored => &[Self::Loading, Self::LoggedOut, Self::LoggedIn],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::LoggedOut => "logged_out",
            Self::LoggedIn => "logged_in",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
