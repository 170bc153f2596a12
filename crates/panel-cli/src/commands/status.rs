use panel_config::PanelConfig;
use serde::Serialize;

use super::PanelStateResponse;
use crate::cli::GlobalFlags;
use crate::context::open_panel;
use crate::output::output;

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    state: Option<PanelStateResponse>,
    session_source: Option<String>,
    note: Option<String>,
}

pub async fn handle(flags: &GlobalFlags, config: &PanelConfig) -> anyhow::Result<()> {
    let status = if let Err(error) = config.require_supabase() {
        StatusResponse {
            state: None,
            session_source: None,
            note: Some(format!(
                "{error}; set AUTHPANEL_SUPABASE__URL and AUTHPANEL_SUPABASE__ANON_KEY"
            )),
        }
    } else {
        let panel = open_panel(config, None).await?;
        let subscription = panel.mount().await;
        let state = PanelStateResponse::of(&panel);
        panel.unmount(subscription);
        StatusResponse {
            state: Some(state),
            session_source: panel.authority().session_source().map(|s| s.to_string()),
            note: None,
        }
    };

    output(&status, flags.format)
}
