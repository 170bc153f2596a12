use std::time::Duration;

use panel_auth::AuthAuthority;
use panel_config::PanelConfig;
use panel_core::AuthPhase;

use super::PanelStateResponse;
use crate::cli::{GlobalFlags, WatchArgs};
use crate::context::open_panel;
use crate::output::output;

/// Print the settled auth state on every change until Ctrl-C.
///
/// The authority re-checks the session every `--interval` seconds and
/// publishes refreshes, revocations and profile edits made elsewhere, which
/// reach the panel through its subscription.
pub async fn handle(
    args: &WatchArgs,
    flags: &GlobalFlags,
    config: &PanelConfig,
) -> anyhow::Result<()> {
    let panel = open_panel(config, None).await?;
    let mut rx = panel.watch();
    let subscription = panel.mount().await;

    let mut last = rx.borrow_and_update().clone();
    output(&PanelStateResponse::new(&last, panel.phase()), flags.format)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if !state.is_loading && state != last {
                    output(&PanelStateResponse::new(&state, AuthPhase::of(&state)), flags.format)?;
                    last = state;
                }
            }
            _ = ticker.tick() => {
                if let Err(error) = panel.authority().get_session().await {
                    tracing::warn!(%error, "session re-check failed");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    panel.unmount(subscription);
    Ok(())
}
