//! Durable-store capability consumed by the identity mirror.

use std::future::Future;

use thiserror::Error;

use crate::record::UserRecord;

/// Table the identity mirror writes to.
pub const USERS_TABLE: &str = "users";

/// Errors a durable store can report for a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused the record (constraint, policy, ...).
    #[error("store rejected write: {0}")]
    Rejected(String),

    /// The table name is not a valid identifier.
    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    /// Transport or engine failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A durable store that can upsert user records keyed by `record.id`.
///
/// Upsert means create-if-absent, overwrite-if-present.
pub trait UserStore: Send + Sync {
    fn upsert(
        &self,
        table: &str,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
