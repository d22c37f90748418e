//! Sign-in against Twitter/X: the OAuth 2.0 authorization-code flow with PKCE,
//! and the per-user [`Session`] the publisher takes its credential from.

pub mod pkce;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::OAuthSettings;
use crate::error::PublishError;
use crate::twitter::TwitterUser;

pub use pkce::Pkce;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("PKCE error: {0}")]
    Pkce(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type OAuthResult<T> = Result<T, OAuthError>;

/// What a signed-in user brings to the publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub bearer_token: Option<String>,
    pub display_name: String,
    pub handle: Option<String>,
}

impl Session {
    pub fn from_user(bearer_token: impl Into<String>, user: &TwitterUser) -> Self {
        Self {
            bearer_token: Some(bearer_token.into()),
            display_name: user.name.clone(),
            handle: Some(user.username.clone()),
        }
    }

    /// The bearer token, or `NotConnected` when there is none.
    pub fn credential(&self) -> Result<&str, PublishError> {
        self.bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(PublishError::NotConnected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Code and state pulled from the redirect back to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationCallback {
    /// Accepts the full redirect URL, its query string, or a bare code.
    pub fn parse(input: &str) -> OAuthResult<Self> {
        let input = input.trim();
        let query = match input.split_once('?') {
            Some((_, query)) => query,
            None if input.contains('=') => input,
            None => {
                return Ok(Self {
                    code: input.to_string(),
                    state: None,
                })
            }
        };

        let mut code = None;
        let mut state = None;
        let mut error = None;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(OAuthError::Denied(error));
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuthError::TokenExchangeFailed("no authorization code in callback".into()))?;
        Ok(Self { code, state })
    }

    pub fn verify_state(&self, expected: &str) -> OAuthResult<()> {
        match &self.state {
            Some(actual) if actual != expected => Err(OAuthError::StateMismatch {
                expected: expected.to_string(),
                actual: actual.clone(),
            }),
            _ => Ok(()),
        }
    }
}

pub struct TwitterAuth {
    settings: OAuthSettings,
    client: Client,
}

impl TwitterAuth {
    pub fn new(settings: OAuthSettings) -> OAuthResult<Self> {
        if settings.client_id.trim().is_empty() {
            return Err(OAuthError::InvalidConfig(
                "client_id is required (set TWITTER_CLIENT_ID)".into(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { settings, client })
    }

    /// URL the user opens to grant access.
    pub fn authorization_url(&self, state: &str, pkce: &Pkce) -> String {
        let scopes = self.settings.scopes.join(" ");
        let params = [
            ("response_type", "code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("scope", scopes.as_str()),
            ("state", state),
            ("code_challenge", pkce.challenge()),
            ("code_challenge_method", pkce.method()),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.settings.authorize_url, query)
    }

    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str, pkce: &Pkce) -> OAuthResult<TokenSet> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code_verifier", pkce.verifier()),
        ];

        self.token_request(&params, None).await
    }

    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> OAuthResult<TokenSet> {
        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
        ];

        self.token_request(&params, Some(refresh_token))
            .await
            .map_err(|e| match e {
                OAuthError::TokenExchangeFailed(msg) => OAuthError::RefreshFailed(msg),
                other => other,
            })
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> OAuthResult<TokenSet> {
        debug!(url = %self.settings.token_url, "Requesting OAuth token");

        let mut req = self.client.post(&self.settings.token_url).form(params);
        if let Some(secret) = &self.settings.client_secret {
            req = req.basic_auth(&self.settings.client_id, Some(secret));
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error: Option<TokenErrorResponse> = response.json().await.ok();
            let message = error
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            return Err(OAuthError::TokenExchangeFailed(message));
        }

        let token: TokenResponse = response.json().await?;
        Ok(TokenSet {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

/// Random `state` value for CSRF protection.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(token_url: String) -> OAuthSettings {
        OAuthSettings {
            client_id: "client-abc".into(),
            client_secret: Some("shh".into()),
            redirect_uri: "http://localhost:3000/callback".into(),
            token_url,
            ..OAuthSettings::default()
        }
    }

    #[test]
    fn test_missing_client_id_is_rejected() {
        let result = TwitterAuth::new(OAuthSettings::default());
        assert!(matches!(result, Err(OAuthError::InvalidConfig(_))));
    }

    #[test]
    fn test_authorization_url_carries_pkce_and_scopes() {
        let auth = TwitterAuth::new(settings("http://unused".into())).unwrap();
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();

        let url = auth.authorization_url("xyz", &pkce);

        assert!(url.starts_with("https://twitter.com/i/oauth2/authorize?response_type=code"));
        assert!(url.contains("client_id=client-abc"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("scope=tweet.read%20tweet.write%20users.read%20offline.access"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/oauth2/token"))
            .and(header_exists("Authorization"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 7200,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = TwitterAuth::new(settings(format!("{}/2/oauth2/token", server.uri()))).unwrap();
        let tokens = auth.exchange_code("the-code", &Pkce::new()).await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert!(tokens.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2"
            })))
            .mount(&server)
            .await;

        let auth = TwitterAuth::new(settings(format!("{}/token", server.uri()))).unwrap();
        let tokens = auth.refresh("refresh-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert!(tokens.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_token_error_uses_description() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_request",
                "error_description": "Value passed for the token was invalid."
            })))
            .mount(&server)
            .await;

        let auth = TwitterAuth::new(settings(format!("{}/token", server.uri()))).unwrap();

        let err = auth.refresh("bad").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Token refresh failed: Value passed for the token was invalid."
        );

        let err = auth.exchange_code("bad", &Pkce::new()).await.unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchangeFailed(_)));
    }

    #[test]
    fn test_callback_parsing() {
        let cb = AuthorizationCallback::parse(
            "http://localhost:3000/callback?state=abc&code=xy%2Fz",
        )
        .unwrap();
        assert_eq!(cb.code, "xy/z");
        assert_eq!(cb.state.as_deref(), Some("abc"));
        assert!(cb.verify_state("abc").is_ok());
        assert!(matches!(
            cb.verify_state("other"),
            Err(OAuthError::StateMismatch { .. })
        ));

        let bare = AuthorizationCallback::parse("  raw-code  ").unwrap();
        assert_eq!(bare.code, "raw-code");
        assert!(bare.verify_state("anything").is_ok());

        let denied = AuthorizationCallback::parse("?error=access_denied&state=abc");
        assert!(matches!(denied, Err(OAuthError::Denied(_))));
    }

    #[test]
    fn test_session_credential() {
        assert!(matches!(
            Session::default().credential(),
            Err(PublishError::NotConnected)
        ));

        let user = TwitterUser {
            id: "1".into(),
            name: "Ada".into(),
            username: "ada".into(),
            profile_image_url: None,
        };
        let session = Session::from_user("tok", &user);
        assert_eq!(session.credential().unwrap(), "tok");
        assert_eq!(session.handle.as_deref(), Some("ada"));
    }

    #[test]
    fn test_state_is_random_hex() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
