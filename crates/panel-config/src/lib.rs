//! # panel-config
//!
//! Layered configuration loading for authpanel using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`AUTHPANEL_*` prefix, `__` as separator)
//! 2. Project-level `.authpanel/config.toml`
//! 3. User-level `~/.config/authpanel/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `AUTHPANEL_SUPABASE__URL` -> `supabase.url`,
//! `AUTHPANEL_AUTH__CALLBACK_TIMEOUT_SECS` -> `auth.callback_timeout_secs`, etc.

mod auth;
mod error;
mod store;
mod supabase;

pub use auth::AuthConfig;
pub use error::ConfigError;
pub use store::StoreConfig;
pub use supabase::SupabaseConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "AUTHPANEL_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl PanelConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed or a value
    /// has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer extra providers.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".authpanel/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Fail unless the auth backend section is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when the Supabase URL or anon key
    /// is missing, and `ConfigError::InvalidValue` for a non-http(s) URL.
    pub fn require_supabase(&self) -> Result<&SupabaseConfig, ConfigError> {
        if !self.supabase.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: "supabase".into(),
            });
        }
        let url = &self.supabase.url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "supabase.url".into(),
                reason: format!("expected an http(s) URL, got '{url}'"),
            });
        }
        Ok(&self.supabase)
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("authpanel").join("config.toml"))
    }
}
