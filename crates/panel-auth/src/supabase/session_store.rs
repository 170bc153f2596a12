use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use panel_core::Session;

use super::SupabaseError;

const DEFAULT_KEYRING_SERVICE: &str = "authpanel";
const KEYRING_USER: &str = "supabase-session";
const SESSION_ENV_VAR: &str = "AUTHPANEL_AUTH__SESSION";
const SESSION_FILE_NAME: &str = "session.json";

/// Keyring service name. Override with `AUTHPANEL_KEYRING_SERVICE` (e.g. in
/// tests) to keep real credentials untouched.
fn keyring_service() -> String {
    std::env::var("AUTHPANEL_KEYRING_SERVICE")
        .unwrap_or_else(|_| DEFAULT_KEYRING_SERVICE.to_string())
}

/// Where a loaded session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Keyring,
    Env,
    File,
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyring => "keyring",
            Self::Env => "env",
            Self::File => "file",
        })
    }
}

/// Persists the backend session between runs as JSON.
///
/// Load priority: keyring, then `AUTHPANEL_AUTH__SESSION`, then
/// `~/.authpanel/session.json`. Saves go to the keyring and fall back to the
/// file when no keyring is available.
#[derive(Debug, Clone)]
pub struct SessionStore {
    keyring_service: Option<String>,
    env_var: Option<&'static str>,
    file: Option<PathBuf>,
}

impl SessionStore {
    /// Keyring, env and home-directory file tiers.
    #[must_use]
    pub fn system() -> Self {
        Self {
            keyring_service: Some(keyring_service()),
            env_var: Some(SESSION_ENV_VAR),
            file: dirs::home_dir().map(|h| h.join(".authpanel").join(SESSION_FILE_NAME)),
        }
    }

    /// Only the given file; no keyring or environment lookup.
    #[must_use]
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            keyring_service: None,
            env_var: None,
            file: Some(path.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `SupabaseError::SessionStore` if the session cannot be encoded
    /// or neither the keyring nor the file accepts it.
    pub fn save(&self, session: &Session) -> Result<(), SupabaseError> {
        let json = serde_json::to_string(session)
            .map_err(|e| SupabaseError::SessionStore(format!("encode session: {e}")))?;

        if let Some(service) = &self.keyring_service {
            match keyring::Entry::new(service, KEYRING_USER) {
                Ok(entry) => match entry.set_password(&json) {
                    Ok(()) => return Ok(()),
                    Err(error) => {
                        tracing::warn!(%error, "keyring store failed; falling back to file");
                    }
                },
                Err(error) => {
                    tracing::warn!(%error, "keyring unavailable; falling back to file");
                }
            }
        }
        self.store_file(&json)
    }

    /// The stored session, if any tier holds a readable one.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        self.load_with_source().map(|(session, _)| session)
    }

    /// Which tier the current session would be loaded from.
    #[must_use]
    pub fn source(&self) -> Option<SessionSource> {
        self.load_with_source().map(|(_, source)| source)
    }

    /// Remove the session from every tier.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::SessionStore` if the session file cannot be removed.
    pub fn delete(&self) -> Result<(), SupabaseError> {
        // Missing keyring entries are fine.
        if let Some(service) = &self.keyring_service
            && let Ok(entry) = keyring::Entry::new(service, KEYRING_USER)
        {
            let _ = entry.delete_credential();
        }

        if let Some(path) = &self.file
            && path.exists()
        {
            fs::remove_file(path).map_err(|e| {
                SupabaseError::SessionStore(format!("failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    fn load_with_source(&self) -> Option<(Session, SessionSource)> {
        if let Some(service) = &self.keyring_service
            && let Ok(entry) = keyring::Entry::new(service, KEYRING_USER)
            && let Ok(json) = entry.get_password()
            && let Some(session) = decode(&json, SessionSource::Keyring)
        {
            return Some((session, SessionSource::Keyring));
        }

        if let Some(var) = self.env_var
            && let Ok(json) = std::env::var(var)
            && let Some(session) = decode(&json, SessionSource::Env)
        {
            return Some((session, SessionSource::Env));
        }

        let path = self.file.as_deref()?;
        let json = fs::read_to_string(path).ok()?;
        decode(&json, SessionSource::File).map(|session| (session, SessionSource::File))
    }

    fn store_file(&self, json: &str) -> Result<(), SupabaseError> {
        let path = self.file.as_deref().ok_or_else(|| {
            SupabaseError::SessionStore("home directory not found, cannot store session".into())
        })?;
        write_private(path, json)
    }
}

fn decode(json: &str, source: SessionSource) -> Option<Session> {
    if json.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(json) {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::warn!(%error, %source, "ignoring unreadable stored session");
            None
        }
    }
}

fn write_private(path: &Path, contents: &str) -> Result<(), SupabaseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SupabaseError::SessionStore(format!("mkdir {}: {e}", parent.display()))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o700)) {
                tracing::warn!("failed to chmod 0700 {}: {e}", parent.display());
            }
        }
    }
    fs::write(path, contents)
        .map_err(|e| SupabaseError::SessionStore(format!("write {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| SupabaseError::SessionStore(format!("chmod {}: {e}", path.display())))?;
    }
    Ok(())
}
