use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::user::User;

/// Application-owned mirror of an observed user, stored in the `users` table.
///
/// Keyed by `id`. Every observation of a logged-in user re-upserts this row,
/// so `email` and `name` always reflect the latest observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// `user_metadata.full_name`, or `""` when the provider sent none.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Build the mirror record for `user`, stamped with `now`.
    #[must_use]
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.user_metadata.full_name.clone().unwrap_or_default(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserMetadata;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn copies_identity_and_full_name() {
        let user = User {
            id: "u1".into(),
            email: "a@b.com".into(),
            user_metadata: UserMetadata {
                full_name: Some("Ann".into()),
                ..Default::default()
            },
        };
        assert_eq!(
            UserRecord::from_user(&user, now()),
            UserRecord {
                id: "u1".into(),
                email: "a@b.com".into(),
                name: "Ann".into(),
                created_at: now(),
            }
        );
    }

    #[test]
    fn name_defaults_to_empty_string() {
        let user = User {
            id: "u2".into(),
            email: "c@d.com".into(),
            user_metadata: UserMetadata::default(),
        };
        let record = UserRecord::from_user(&user, now());
        assert_eq!(record.name, "");
    }

    #[test]
    fn schema_requires_every_column() {
        let schema = schemars::schema_for!(UserRecord);
        let value = serde_json::to_value(&schema).unwrap();
        let required: Vec<&str> = value["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect();
        for column in ["id", "email", "name", "created_at"] {
            assert!(required.contains(&column), "missing {column}");
        }
    }
}
