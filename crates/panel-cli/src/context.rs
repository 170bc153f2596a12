//! Wiring from configuration to a ready [`Panel`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use panel_auth::{IdentityMirror, ObserverOptions, SessionObserver, SupabaseAuthority};
use panel_config::{PanelConfig, StoreConfig};
use panel_db::PanelDb;

/// The login panel as the CLI runs it.
pub type Panel = SessionObserver<SupabaseAuthority, PanelDb>;

/// Build the panel for `config`. `redirect_to` overrides `supabase.redirect_to`.
pub async fn open_panel(config: &PanelConfig, redirect_to: Option<String>) -> anyhow::Result<Panel> {
    let supabase = config
        .require_supabase()
        .context("set AUTHPANEL_SUPABASE__URL and AUTHPANEL_SUPABASE__ANON_KEY")?;

    let authority = SupabaseAuthority::from_config(supabase, &config.auth);
    let db = open_store(&config.store).await?;
    let options = ObserverOptions {
        redirect_to: redirect_to.or_else(|| supabase.redirect_to()),
    };

    Ok(SessionObserver::new(
        Arc::new(authority),
        IdentityMirror::new(Arc::new(db)),
        options,
    ))
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<PanelDb> {
    let path = config
        .resolved_path()
        .context("home directory not found; set AUTHPANEL_STORE__PATH")?;
    ensure_parent_dir(&path)?;

    let path_str = path
        .to_str()
        .with_context(|| format!("store path is not valid UTF-8: {}", path.display()))?;
    PanelDb::open_local(path_str)
        .await
        .with_context(|| format!("failed to open user mirror at {}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if path == Path::new(":memory:") {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
