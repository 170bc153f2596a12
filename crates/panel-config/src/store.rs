//! Durable user-store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// libSQL database path. Empty means `~/.authpanel/panel.db`.
    #[serde(default)]
    pub path: String,
}

impl StoreConfig {
    /// Resolve the database path, falling back to the per-user default.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.path.is_empty() {
            return Some(PathBuf::from(&self.path));
        }
        dirs::home_dir().map(|home| home.join(".authpanel").join("panel.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let config = StoreConfig {
            path: ":memory:".into(),
        };
        assert_eq!(config.resolved_path(), Some(PathBuf::from(":memory:")));
    }

    #[test]
    fn default_path_is_under_home() {
        let path = StoreConfig::default().resolved_path().expect("home dir");
        assert!(path.ends_with(".authpanel/panel.db"));
    }
}
