//! Identity mirror: keeps the application's `users` table in step with the
//! users the auth backend reports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use panel_core::{USERS_TABLE, User, UserRecord, UserStore};

use crate::error::AuthError;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Upserts a [`UserRecord`] for every observed user.
///
/// Writes are not deduplicated: the same user observed twice is written
/// twice. The upsert is idempotent, so a repeated or missed notification is
/// harmless.
pub struct IdentityMirror<S> {
    store: Arc<S>,
    clock: Clock,
}

impl<S> Clone for IdentityMirror<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: UserStore> IdentityMirror<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the timestamp source used for `created_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Upsert the mirror record for `user` and return what was written.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MirrorWrite` if the store rejects the write.
    pub async fn mirror(&self, user: &User) -> Result<UserRecord, AuthError> {
        let record = UserRecord::from_user(user, (self.clock)());
        self.store.upsert(USERS_TABLE, &record).await?;
        tracing::debug!(user_id = %record.id, "mirrored user record");
        Ok(record)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
