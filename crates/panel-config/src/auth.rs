//! Login-flow timing configuration.

use serde::{Deserialize, Serialize};

/// Default wait for the browser OAuth callback.
const fn default_callback_timeout_secs() -> u64 {
    120
}

/// Default refresh window before access-token expiry.
const fn default_refresh_buffer_secs() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// How long the loopback server waits for the OAuth callback.
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    /// Refresh the stored session when it expires within this many seconds.
    #[serde(default = "default_refresh_buffer_secs")]
    pub refresh_buffer_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            callback_timeout_secs: default_callback_timeout_secs(),
            refresh_buffer_secs: default_refresh_buffer_secs(),
        }
    }
}

impl AuthConfig {
    pub const fn callback_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.callback_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = AuthConfig::default();
        assert_eq!(config.callback_timeout_secs, 120);
        assert_eq!(config.refresh_buffer_secs, 60);
        assert_eq!(config.callback_timeout().as_secs(), 120);
    }
}
