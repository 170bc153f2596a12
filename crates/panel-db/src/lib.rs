//! # panel-db
//!
//! libSQL storage for the authpanel user mirror.
//!
//! Owns the `users` table and implements [`panel_core::UserStore`] so the
//! identity mirror can upsert observed users into it.

pub mod error;
pub mod helpers;
mod migrations;
pub mod users;

use error::DatabaseError;
use libsql::Builder;

/// Handle to the local mirror database.
pub struct PanelDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl PanelDb {
    /// Open a local database at `path` (`":memory:"` for tests).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let panel_db = Self { db, conn };
        panel_db.run_migrations().await?;
        tracing::debug!(path, "opened user mirror database");
        Ok(panel_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}
