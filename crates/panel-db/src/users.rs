//! `users` table: the durable mirror of observed identities.

use panel_core::{StoreError, USERS_TABLE, UserRecord, UserStore};

use crate::PanelDb;
use crate::error::DatabaseError;
use crate::helpers::{is_valid_identifier, parse_datetime};

impl PanelDb {
    /// Upsert `record` into `table`, keyed by `id`.
    ///
    /// Existing rows are overwritten column by column.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Query` for an invalid table name, or the
    /// underlying libSQL error.
    pub async fn upsert_user(&self, table: &str, record: &UserRecord) -> Result<(), DatabaseError> {
        if !is_valid_identifier(table) {
            return Err(DatabaseError::Query(format!("invalid table name '{table}'")));
        }
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {table} (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                         email = excluded.email,
                         name = excluded.name,
                         created_at = excluded.created_at"
                ),
                libsql::params![
                    record.id.as_str(),
                    record.email.as_str(),
                    record.name.as_str(),
                    record.created_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Fetch the mirrored record for `id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or a row cannot be parsed.
    pub async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, name, created_at FROM users WHERE id = ?1",
                [id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let created_at: String = row.get(3)?;
        Ok(Some(UserRecord {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: parse_datetime(&created_at)?,
        }))
    }

    /// Number of mirrored users.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_users(&self) -> Result<u64, DatabaseError> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM users", ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        u64::try_from(count).map_err(|e| DatabaseError::Query(format!("negative count: {e}")))
    }
}

impl UserStore for PanelDb {
    async fn upsert(&self, table: &str, record: &UserRecord) -> Result<(), StoreError> {
        if !is_valid_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }
        if table != USERS_TABLE {
            tracing::debug!(table, "upserting into a non-default users table");
        }
        self.upsert_user(table, record).await.map_err(StoreError::from)
    }
}
