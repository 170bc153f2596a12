use std::time::Duration;

use anyhow::Context;
use panel_config::PanelConfig;
use serde::Serialize;

use super::PanelStateResponse;
use crate::cli::{GlobalFlags, LoginArgs};
use crate::context::{Panel, open_panel};
use crate::output::output;

/// Extra wait past the callback timeout for the code exchange.
const EXCHANGE_GRACE: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct LoginResponse {
    provider: String,
    url: String,
    /// False when the callback goes to another app and cannot be awaited.
    awaited: bool,
    #[serde(flatten)]
    state: PanelStateResponse,
}

pub async fn handle(
    args: &LoginArgs,
    flags: &GlobalFlags,
    config: &PanelConfig,
) -> anyhow::Result<()> {
    let redirect_to = args
        .redirect_to
        .clone()
        .or_else(|| config.supabase.redirect_to());
    let awaited = redirect_to.is_none();

    let panel = open_panel(config, redirect_to).await?;
    let subscription = panel.mount().await;

    let redirect = match panel.sign_in(args.provider).await {
        Ok(redirect) => redirect,
        Err(error) => {
            let state = PanelStateResponse::of(&panel);
            panel.unmount(subscription);
            output(&state, flags.format)?;
            return Err(error).context(format!("login with {} failed", args.provider));
        }
    };

    if !flags.quiet {
        eprintln!("Opening browser to: {}", redirect.url);
        if awaited {
            eprintln!("Waiting for the browser to finish signing in...");
        }
    }

    let settled = awaited
        && wait_until_settled(&panel, config.auth.callback_timeout() + EXCHANGE_GRACE).await;
    let failure = panel.state().error;
    let response = LoginResponse {
        provider: redirect.provider.to_string(),
        url: redirect.url,
        awaited,
        state: PanelStateResponse::of(&panel),
    };
    panel.unmount(subscription);
    output(&response, flags.format)?;

    if let Some(failure) = failure {
        anyhow::bail!("login with {} failed: {failure}", args.provider);
    }
    if awaited && !settled {
        anyhow::bail!(
            "login did not complete within {}s",
            config.auth.callback_timeout_secs
        );
    }
    Ok(())
}

/// Wait for the `SIGNED_IN` notification or sign-in failure that ends the
/// pending sign-in.
async fn wait_until_settled(panel: &Panel, timeout: Duration) -> bool {
    let mut rx = panel.watch();
    tokio::time::timeout(timeout, async move {
        rx.wait_for(|state| !state.is_loading).await.is_ok()
    })
    .await
    .unwrap_or(false)
}
