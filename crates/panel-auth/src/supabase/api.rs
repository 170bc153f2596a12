//! Thin client for the Supabase auth (GoTrue) REST endpoints the panel uses.
//!
//! Every request carries the project's anon key in the `apikey` header;
//! user-scoped calls add `Authorization: Bearer <access token>`.

use chrono::{DateTime, TimeDelta, Utc};
use panel_core::{OAuthProvider, Session, User};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::SupabaseError;
use super::pkce::{CHALLENGE_METHOD, Pkce};

/// `/token` response: a session plus a relative expiry some servers send
/// instead of `expires_at`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    session: Session,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let mut session = self.session;
        if session.expires_at.is_none() {
            session.expires_at = self.expires_in.map(|secs| now + TimeDelta::seconds(secs));
        }
        session
    }
}

#[derive(Debug, Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl AuthApi {
    /// `base_url` is the auth root, e.g. `https://abcd.supabase.co/auth/v1`.
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Browser URL that starts the provider's consent screen.
    ///
    /// With `pkce` the backend redirects back with `?code=`; without it the
    /// tokens land in the redirect's URL fragment.
    #[must_use]
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
        pkce: Option<&Pkce>,
    ) -> String {
        let mut url = format!("{}/authorize?provider={provider}", self.base_url);
        if let Some(redirect_to) = redirect_to {
            url.push_str(&format!("&redirect_to={}", urlencoding::encode(redirect_to)));
        }
        if let Some(pkce) = pkce {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method={CHALLENGE_METHOD}",
                pkce.challenge
            ));
        }
        url
    }

    /// Trade an authorization code for a session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` for a rejected code or verifier, and
    /// `SupabaseError::Http` when the backend is unreachable.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Session, SupabaseError> {
        let resp = self
            .client
            .post(format!("{}/token?grant_type=pkce", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "auth_code": code,
                "code_verifier": verifier,
            }))
            .send()
            .await?;
        let token: TokenResponse = read_json(resp, "exchange code").await?;
        Ok(token.into_session(Utc::now()))
    }

    /// # Errors
    ///
    /// Returns `SupabaseError::Api` when the refresh token is rejected (a 4xx
    /// means the session is gone for good).
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let resp = self
            .client
            .post(format!("{}/token?grant_type=refresh_token", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = read_json(resp, "refresh session").await?;
        Ok(token.into_session(Utc::now()))
    }

    /// The user the access token belongs to, with current metadata.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with status 401 or 403 for a dead token.
    pub async fn get_user(&self, access_token: &str) -> Result<User, SupabaseError> {
        let resp = self
            .client
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        read_json(resp, "get user").await
    }

    /// Revoke the session server-side.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` for any non-success status.
    pub async fn logout(&self, access_token: &str) -> Result<(), SupabaseError> {
        let resp = self
            .client
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T, SupabaseError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| SupabaseError::Decode(format!("{what}: {e}")))
}

/// Best human-readable message from a GoTrue error body.
///
/// GoTrue has used `error_description`, `msg`, `message` and `error` over its
/// versions; the raw body is the fallback.
pub(crate) fn api_error(status: u16, body: &str) -> SupabaseError {
    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|value| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| value.get(key)?.as_str().map(str::to_string))
    });
    let message = from_json.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            trimmed.to_string()
        }
    });
    SupabaseError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockServer;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TOKEN_BODY: &str = r#"{
        "access_token": "at-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "rt-1",
        "user": {"id": "u1", "email": "a@b.com", "user_metadata": {"full_name": "Ann"}}
    }"#;

    fn api(server: &MockServer) -> AuthApi {
        AuthApi::new(&server.base_url, "anon-key")
    }

    #[test]
    fn authorize_url_with_pkce() {
        let api = AuthApi::new("https://abcd.supabase.co/auth/v1/", "anon");
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wkoAA6u1zZkZ".into());
        let url = api.authorize_url(
            OAuthProvider::Google,
            Some("http://127.0.0.1:5000/callback?state=s1"),
            Some(&pkce),
        );
        assert_eq!(
            url,
            "https://abcd.supabase.co/auth/v1/authorize?provider=google\
             &redirect_to=http%3A%2F%2F127.0.0.1%3A5000%2Fcallback%3Fstate%3Ds1\
             &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM\
             &code_challenge_method=s256"
        );
    }

    #[test]
    fn authorize_url_without_redirect() {
        let api = AuthApi::new("https://abcd.supabase.co/auth/v1", "anon");
        assert_eq!(
            api.authorize_url(OAuthProvider::Apple, None, None),
            "https://abcd.supabase.co/auth/v1/authorize?provider=apple"
        );
    }

    #[rstest]
    #[case(400, r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#, "Invalid Refresh Token")]
    #[case(401, r#"{"code":401,"msg":"invalid JWT"}"#, "invalid JWT")]
    #[case(422, r#"{"message":"code verifier mismatch"}"#, "code verifier mismatch")]
    #[case(500, "upstream exploded\n", "upstream exploded")]
    #[case(503, "", "HTTP 503")]
    fn error_bodies(#[case] status: u16, #[case] body: &str, #[case] message: &str) {
        let err = api_error(status, body);
        assert_eq!(err.status(), Some(status));
        assert!(matches!(err, SupabaseError::Api { message: ref m, .. } if m == message));
    }

    #[tokio::test]
    async fn exchange_code_posts_verifier_and_fills_expiry() {
        let server = MockServer::start(vec![(200, TOKEN_BODY)]);
        let before = Utc::now();

        let session = api(&server).exchange_code("code-1", "verifier-1").await.unwrap();

        assert_eq!(session.access_token, "at-1");
        assert_eq!(session.user.display_name(), Some("Ann"));
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + TimeDelta::seconds(3599));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "/auth/v1/token?grant_type=pkce");
        assert_eq!(requests[0].apikey.as_deref(), Some("anon-key"));
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["auth_code"], "code-1");
        assert_eq!(body["code_verifier"], "verifier-1");
    }

    #[tokio::test]
    async fn refresh_rejection_is_client_error() {
        let server = MockServer::start(vec![(
            400,
            r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#,
        )]);

        let err = api(&server).refresh("rt-old").await.unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(server.requests()[0].url, "/auth/v1/token?grant_type=refresh_token");
    }

    #[tokio::test]
    async fn get_user_sends_bearer() {
        let server = MockServer::start(vec![(200, r#"{"id":"u1","email":"a@b.com"}"#)]);

        let user = api(&server).get_user("at-1").await.unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(server.requests()[0].authorization.as_deref(), Some("Bearer at-1"));
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let server = MockServer::start(vec![(200, "<html>captive portal</html>")]);
        let err = api(&server).get_user("at-1").await.unwrap_err();
        assert!(matches!(err, SupabaseError::Decode(ref m) if m.starts_with("get user")));
    }

    #[tokio::test]
    async fn logout_surfaces_status() {
        let server = MockServer::start(vec![(204, ""), (500, r#"{"msg":"db down"}"#)]);
        let api = api(&server);

        api.logout("at-1").await.unwrap();
        let err = api.logout("at-1").await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(server.requests()[1].url, "/auth/v1/logout");
    }
}
