mod login;
mod logout;
mod status;
mod watch;

use panel_config::PanelConfig;
use panel_core::{AuthPhase, UiAuthState, User};
use serde::Serialize;

use crate::cli::{Commands, GlobalFlags};
use crate::context::Panel;

/// Route a parsed command to its handler.
pub async fn dispatch(
    command: &Commands,
    flags: &GlobalFlags,
    config: &PanelConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Login(args) => login::handle(args, flags, config).await,
        Commands::Logout => logout::handle(flags, config).await,
        Commands::Status => status::handle(flags, config).await,
        Commands::Watch(args) => watch::handle(args, flags, config).await,
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    id: String,
    email: String,
    name: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name().map(str::to_string),
        }
    }
}

/// What every command prints about the panel.
#[derive(Debug, Serialize)]
pub struct PanelStateResponse {
    phase: AuthPhase,
    logged_in: bool,
    is_loading: bool,
    user: Option<UserResponse>,
    error: Option<String>,
}

impl PanelStateResponse {
    pub fn new(state: &UiAuthState, phase: AuthPhase) -> Self {
        Self {
            phase,
            logged_in: state.is_logged_in(),
            is_loading: state.is_loading,
            user: state.user.as_ref().map(UserResponse::from),
            error: state.error.clone(),
        }
    }

    pub fn of(panel: &Panel) -> Self {
        Self::new(&panel.state(), panel.phase())
    }
}
