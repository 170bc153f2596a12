use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Authenticated user identity as reported by the auth backend.
///
/// Owned by the backend; authpanel only reads it. Unknown backend fields
/// (`aud`, `role`, `app_metadata`, ...) are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    /// Stable unique identifier.
    pub id: String,
    /// Primary email. Empty when the provider withheld it.
    #[serde(default)]
    pub email: String,
    /// Provider-sourced profile data.
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Free-form profile metadata copied from the OAuth provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserMetadata {
    /// Display name, when the provider shares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata
            .full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_backend_user_payload() {
        let json = r#"{
            "id": "u1",
            "aud": "authenticated",
            "email": "a@b.com",
            "user_metadata": {"full_name": "Ann", "avatar_url": "https://img/ann.png"}
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.display_name(), Some("Ann"));
        assert_eq!(
            user.user_metadata.extra.get("avatar_url"),
            Some(&serde_json::json!("https://img/ann.png"))
        );
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let user: User = serde_json::from_str(r#"{"id": "u2", "email": "c@d.com"}"#).unwrap();
        assert!(user.user_metadata.full_name.is_none());
        assert!(user.user_metadata.extra.is_empty());
        assert_eq!(user.display_name(), None);
    }

    #[test]
    fn blank_full_name_is_not_a_display_name() {
        let user: User = serde_json::from_str(
            r#"{"id": "u3", "email": "e@f.com", "user_metadata": {"full_name": "  "}}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), None);
    }
}
