//! # panel-auth
//!
//! Session observation for the authpanel login view.
//!
//! - [`SessionObserver`] keeps a [`UiAuthState`](panel_core::UiAuthState)
//!   current from an [`AuthAuthority`]'s responses and change notifications
//! - [`IdentityMirror`] upserts every observed user into the `users` table of
//!   a [`UserStore`](panel_core::UserStore)
//! - [`supabase::SupabaseAuthority`] talks to Supabase auth over REST, with a
//!   PKCE browser flow (`tiny_http` + `open`) and keyring session storage

pub mod authority;
pub mod error;
pub mod mirror;
pub mod observer;
pub mod supabase;

#[cfg(test)]
mod test_support;

pub use authority::{AuthAuthority, AuthNotice, ChangeFeed, OAuthRedirect, SignInOptions};
pub use error::{AuthError, BackendError};
pub use mirror::IdentityMirror;
pub use observer::{ObserverOptions, SessionObserver, Subscription};
pub use supabase::{SupabaseAuthority, SupabaseError};
