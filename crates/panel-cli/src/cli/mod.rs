use clap::{Args, Parser, Subcommand};
use panel_core::OAuthProvider;

pub mod global;

pub use global::{GlobalFlags, OutputFormat};

/// Top-level CLI parser for the `authpanel` binary.
#[derive(Debug, Parser)]
#[command(name = "authpanel", version, about = "OAuth login panel for Supabase-backed apps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Sign in through an OAuth provider in the browser.
    Login(LoginArgs),
    /// End the current session.
    Logout,
    /// Show who is signed in.
    Status,
    /// Print the auth state every time it changes.
    Watch(WatchArgs),
}

#[derive(Clone, Debug, Args)]
pub struct LoginArgs {
    /// OAuth provider: google, apple
    #[arg(short = 'p', long, default_value = "google")]
    pub provider: OAuthProvider,

    /// Hand the callback to this URL instead of a local loopback server.
    #[arg(long)]
    pub redirect_to: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct WatchArgs {
    /// Seconds between session re-checks.
    #[arg(long, default_value_t = 30)]
    pub interval: u64,
}
