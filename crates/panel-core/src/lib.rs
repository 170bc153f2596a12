//! # panel-core
//!
//! Core types shared across the authpanel crates.
//!
//! This crate holds only data and the store capability seam:
//! - `User` / `Session` as handed out by the auth backend
//! - `UserRecord`, the durable mirror of an observed user
//! - `OAuthProvider` and `AuthChangeEvent` enums
//! - `UiAuthState` and the `AuthPhase` state machine
//! - the `UserStore` trait implemented by `panel-db`

pub mod enums;
pub mod record;
pub mod session;
pub mod state;
pub mod store;
pub mod user;

pub use enums::{AuthChangeEvent, OAuthProvider};
pub use record::UserRecord;
pub use session::{Session, SessionChange};
pub use state::{AuthPhase, UiAuthState};
pub use store::{StoreError, USERS_TABLE, UserStore};
pub use user::{User, UserMetadata};
