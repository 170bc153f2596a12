//! Loopback HTTP server that receives the OAuth redirect.
//!
//! `tiny_http::Server::recv_timeout` blocks, so callers run
//! [`LoopbackServer::wait_for_code`] inside `spawn_blocking`.

use std::time::{Duration, Instant};

use super::SupabaseError;

const CALLBACK_PATH: &str = "/callback";

/// What a single request to the loopback server means for the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Authorization code for the PKCE exchange.
    Code(String),
    /// The provider or the user refused consent.
    Denied(String),
    /// `state` missing or not ours.
    StateMismatch,
    /// Not the callback (favicon, preflight, intermediate redirect).
    Ignore,
}

/// Classify a request target such as `/callback?code=..&state=..`.
#[must_use]
pub fn parse_callback(target: &str, expected_state: &str) -> CallbackOutcome {
    let Some((path, query)) = target.split_once('?') else {
        return CallbackOutcome::Ignore;
    };
    if path != CALLBACK_PATH {
        return CallbackOutcome::Ignore;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let Ok(value) = urlencoding::decode(&value.replace('+', " ")).map(|v| v.into_owned())
        else {
            continue;
        };
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            "error_description" => error_description = Some(value),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return if code.is_some() || error.is_some() {
            CallbackOutcome::StateMismatch
        } else {
            CallbackOutcome::Ignore
        };
    }
    if let Some(error) = error {
        return CallbackOutcome::Denied(error_description.unwrap_or(error));
    }
    code.map_or(CallbackOutcome::Ignore, CallbackOutcome::Code)
}

/// A bound `127.0.0.1:<random port>` listener waiting for one OAuth callback.
pub struct LoopbackServer {
    server: tiny_http::Server,
    port: u16,
    state: String,
}

impl LoopbackServer {
    /// Bind on a random local port.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::BrowserFlow` if the port cannot be bound.
    pub fn bind(state: String) -> Result<Self, SupabaseError> {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| SupabaseError::BrowserFlow(format!("failed to bind: {e}")))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .ok_or_else(|| SupabaseError::BrowserFlow("no port".into()))?;
        Ok(Self {
            server,
            port,
            state,
        })
    }

    /// Address the provider should redirect to, `state` included.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        format!(
            "http://127.0.0.1:{}{CALLBACK_PATH}?state={}",
            self.port, self.state
        )
    }

    /// Block until the callback delivers a code, the user denies, or `timeout`
    /// passes. Unrelated requests are answered and skipped.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::BrowserFlow` on timeout, denial or state mismatch.
    pub fn wait_for_code(self, timeout: Duration) -> Result<String, SupabaseError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || {
            SupabaseError::BrowserFlow(format!(
                "browser callback timed out after {}s",
                timeout.as_secs()
            ))
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            let request = match self.server.recv_timeout(remaining) {
                Ok(Some(request)) => request,
                Ok(None) => return Err(timed_out()),
                Err(e) => return Err(SupabaseError::BrowserFlow(format!("recv error: {e}"))),
            };

            match parse_callback(request.url(), &self.state) {
                CallbackOutcome::Code(code) => {
                    respond(
                        request,
                        200,
                        "<h1>Signed in</h1><p>You can close this tab.</p>",
                    );
                    return Ok(code);
                }
                CallbackOutcome::Denied(reason) => {
                    respond(request, 400, "<h1>Sign-in cancelled</h1><p>Check the terminal.</p>");
                    return Err(SupabaseError::BrowserFlow(format!("sign-in denied: {reason}")));
                }
                CallbackOutcome::StateMismatch => {
                    respond(
                        request,
                        400,
                        "<h1>Sign-in failed</h1><p>State mismatch. Check the terminal.</p>",
                    );
                    return Err(SupabaseError::BrowserFlow("callback state mismatch".into()));
                }
                CallbackOutcome::Ignore => {
                    let _ = request.respond(tiny_http::Response::empty(204));
                }
            }
        }
    }
}

fn respond(request: tiny_http::Request, status: u16, body: &str) {
    let mut response = tiny_http::Response::from_string(format!("<html><body>{body}</body></html>"))
        .with_status_code(status);
    if let Ok(header) = tiny_http::Header::from_bytes("Content-Type", "text/html; charset=utf-8") {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}
