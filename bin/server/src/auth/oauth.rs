//! OAuth 2.0 authorization-code client for the identity provider.
//!
//! The callback consumes the three operations in order: build the
//! authorization URL, exchange the returned code, then fetch the identity
//! the token belongs to. The Google implementation builds a fresh
//! `oauth2` client per call from validated endpoint URLs.

use async_trait::async_trait;
use oauth2::{
    AccessToken, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use recipes_core::ExternalId;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::config::OAuthConfig;

/// Operations the login flow needs from the identity provider.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Builds the URL the browser is sent to, carrying `state` verbatim.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, Report<OAuthError>>;

    /// Fetches the identity the access token was issued for.
    async fn fetch_identity(&self, token: &AccessToken) -> Result<ExternalId, Report<OAuthError>>;
}

/// Profile fields read from the userinfo endpoint.
#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    id: String,
}

/// OAuth client for Google's authorization-code flow.
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: Url,
    scopes: Vec<Scope>,
    http_client: reqwest::Client,
}

impl GoogleOAuthClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &OAuthConfig) -> Result<Self, Report<OAuthError>> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| OAuthError::configuration("auth URL", &e))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| OAuthError::configuration("token URL", &e))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| OAuthError::configuration("redirect URL", &e))?;
        let userinfo_url = Url::parse(&config.userinfo_url)
            .map_err(|e| OAuthError::configuration("userinfo URL", &e))?;

        // Redirects are never followed; the token endpoint must answer directly.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| OAuthError::configuration("HTTP client", &e))?;

        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            auth_url,
            token_url,
            redirect_url,
            userinfo_url,
            scopes: config
                .scopes()
                .into_iter()
                .map(|scope| Scope::new(scope.to_string()))
                .collect(),
            http_client,
        })
    }
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let (url, _) = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.scopes.iter().cloned())
            .url();

        url.to_string()
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, Report<OAuthError>> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| OAuthError::TokenExchange {
                details: e.to_string(),
            })?;

        debug!("Exchanged authorization code");
        Ok(token.access_token().clone())
    }

    #[instrument(skip_all)]
    async fn fetch_identity(&self, token: &AccessToken) -> Result<ExternalId, Report<OAuthError>> {
        let response = self
            .http_client
            .get(self.userinfo_url.clone())
            .bearer_auth(token.secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| OAuthError::IdentityFetch {
                details: e.to_string(),
            })?;

        let info: UserInfo = response.json().await.map_err(|e| OAuthError::IdentityFetch {
            details: format!("undecodable profile: {e}"),
        })?;

        if info.id.is_empty() {
            return Err(OAuthError::IdentityFetch {
                details: "profile has no id".to_string(),
            }
            .into());
        }

        Ok(ExternalId::new(info.id))
    }
}

/// OAuth client errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// The client configuration is invalid.
    Configuration { details: String },
    /// The token endpoint rejected the code or could not be reached.
    TokenExchange { details: String },
    /// The profile endpoint failed or returned no usable identity.
    IdentityFetch { details: String },
}

impl OAuthError {
    fn configuration(what: &str, err: &dyn fmt::Display) -> Self {
        Self::Configuration {
            details: format!("invalid {what}: {err}"),
        }
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "OAuth configuration error: {details}"),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {details}"),
            Self::IdentityFetch { details } => write!(f, "identity fetch failed: {details}"),
        }
    }
}

impl std::error::Error for OAuthError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server_uri: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:8000/auth/callback".to_string(),
            auth_url: format!("{server_uri}/auth"),
            token_url: format!("{server_uri}/token"),
            userinfo_url: format!("{server_uri}/userinfo"),
            scopes: "openid".to_string(),
            request_timeout_seconds: 5,
        }
    }

    #[test]
    fn authorization_url_carries_state_verbatim() {
        let client = GoogleOAuthClient::new(&config_for("https://idp.example")).expect("client");

        let url = Url::parse(&client.authorization_url("next=%2Frecipes&nonce=abc"))
            .expect("valid URL");
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/auth");
        assert_eq!(params["state"], "next=%2Frecipes&nonce=abc");
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid");
        assert_eq!(params["redirect_uri"], "http://localhost:8000/auth/callback");
    }

    #[test]
    fn invalid_redirect_url_is_rejected() {
        let mut config = config_for("https://idp.example");
        config.redirect_url = "not a url".to_string();

        let err = GoogleOAuthClient::new(&config).expect_err("invalid URL");
        assert!(err.to_string().contains("redirect URL"));
    }

    #[tokio::test]
    async fn exchanges_code_for_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=VALID"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(&config_for(&server.uri())).expect("client");
        let token = client.exchange_code("VALID").await.expect("exchange");

        assert_eq!(token.secret(), "tok");
    }

    #[tokio::test]
    async fn rejected_code_fails_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(&config_for(&server.uri())).expect("client");
        let err = client.exchange_code("EXPIRED").await.expect_err("rejected");

        assert!(err.to_string().contains("token exchange failed"));
    }

    #[tokio::test]
    async fn fetches_identity_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "108234",
                "email": "cook@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(&config_for(&server.uri())).expect("client");
        let id = client
            .fetch_identity(&AccessToken::new("tok".to_string()))
            .await
            .expect("identity");

        assert_eq!(id.as_str(), "108234");
    }

    #[tokio::test]
    async fn profile_without_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(&config_for(&server.uri())).expect("client");
        let err = client
            .fetch_identity(&AccessToken::new("tok".to_string()))
            .await
            .expect_err("no id");

        assert!(err.to_string().contains("identity fetch failed"));
    }

    #[tokio::test]
    async fn profile_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(&config_for(&server.uri())).expect("client");
        let result = client
            .fetch_identity(&AccessToken::new("expired".to_string()))
            .await;

        assert!(result.is_err());
    }
}
