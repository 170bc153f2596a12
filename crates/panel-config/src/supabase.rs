//! Supabase (GoTrue) auth backend configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SupabaseConfig {
    /// Project URL (e.g., `https://abcd.supabase.co`).
    #[serde(default)]
    pub url: String,

    /// Public anon key sent as the `apikey` header.
    #[serde(default)]
    pub anon_key: String,

    /// Callback address forwarded to the OAuth flow. Empty means a local
    /// loopback callback is used.
    #[serde(default)]
    pub redirect_to: String,
}

impl SupabaseConfig {
    /// Check if the Supabase config has the minimum required fields.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }

    /// Base URL of the auth API, without trailing slash.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url.trim_end_matches('/'))
    }

    /// `redirect_to` as an option.
    pub fn redirect_to(&self) -> Option<String> {
        let trimmed = self.redirect_to.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        assert!(!SupabaseConfig::default().is_configured());
    }

    #[test]
    fn configured_when_url_and_key_set() {
        let config = SupabaseConfig {
            url: "https://abcd.supabase.co".into(),
            anon_key: "anon".into(),
            ..Default::default()
        };
        assert!(config.is_configured());
    }

    #[test]
    fn auth_url_strips_trailing_slash() {
        let config = SupabaseConfig {
            url: "https://abcd.supabase.co/".into(),
            ..Default::default()
        };
        assert_eq!(config.auth_url(), "https://abcd.supabase.co/auth/v1");
    }

    #[test]
    fn blank_redirect_is_none() {
        let mut config = SupabaseConfig {
            redirect_to: "  ".into(),
            ..Default::default()
        };
        assert_eq!(config.redirect_to(), None);
        config.redirect_to = "https://app.example.com/done".into();
        assert_eq!(
            config.redirect_to().as_deref(),
            Some("https://app.example.com/done")
        );
    }
}
