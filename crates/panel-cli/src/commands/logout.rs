use anyhow::Context;
use panel_config::PanelConfig;

use super::PanelStateResponse;
use crate::cli::GlobalFlags;
use crate::context::open_panel;
use crate::output::output;

pub async fn handle(flags: &GlobalFlags, config: &PanelConfig) -> anyhow::Result<()> {
    let panel = open_panel(config, None).await?;
    let subscription = panel.mount().await;

    let outcome = panel.sign_out().await;
    let state = PanelStateResponse::of(&panel);
    panel.unmount(subscription);

    output(&state, flags.format)?;
    outcome.context("logout failed")
}
