//! Centralized server configuration.
//!
//! Configuration is loaded once at startup via the `config` crate from
//! environment variables, using `__` to separate nested keys
//! (`SESSION__SECRET_KEY`, `OAUTH__CLIENT_ID`, ...). Components receive the
//! sections they need; nothing reads the environment after startup.

use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::fmt;

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google's user profile endpoint.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Longest accepted session lifetime: one leap year.
pub const MAX_SESSION_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Whether to apply embedded migrations at startup.
    #[serde(default)]
    pub run_migrations: bool,

    /// Session configuration.
    pub session: SessionConfig,

    /// OAuth client configuration.
    pub oauth: OAuthConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Base64-encoded key used to sign the session cookie.
    pub secret_key: String,
}

/// OAuth client configuration for the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider.
    pub redirect_url: String,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,

    /// Comma-separated scopes requested at login.
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Timeout applied to each outbound call to the provider.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_session_duration_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_userinfo_url() -> String {
    GOOGLE_USERINFO_URL.to_string()
}

fn default_scopes() -> String {
    "openid".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        Self::load(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load<S>(source: S) -> Result<Self, Report<ConfigError>>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigError::Load {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that deserialize but cannot be used.
    fn validate(&self) -> Result<(), Report<ConfigError>> {
        let session = &self.session;
        if !(1..=MAX_SESSION_DURATION_MINUTES).contains(&session.duration_minutes) {
            return Err(ConfigError::Invalid {
                field: "session.duration_minutes",
                details: format!(
                    "must be between 1 and {MAX_SESSION_DURATION_MINUTES}, got {}",
                    session.duration_minutes
                ),
            }
            .into());
        }
        if session.cleanup_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "session.cleanup_interval_seconds",
                details: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.oauth.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "oauth.request_timeout_seconds",
                details: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Decodes the cookie signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64 or is shorter than
    /// 64 bytes.
    pub fn signing_key(&self) -> Result<Key, Report<ConfigError>> {
        let bytes = STANDARD
            .decode(self.secret_key.trim())
            .map_err(|e| ConfigError::InvalidSecretKey {
                details: e.to_string(),
            })?;

        let key = Key::try_from(bytes.as_slice()).map_err(|e| ConfigError::InvalidSecretKey {
            details: e.to_string(),
        })?;
        Ok(key)
    }
}

impl OAuthConfig {
    /// Returns the configured scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is missing or has the wrong type.
    Load { details: String },
    /// A value is present but out of range.
    Invalid {
        field: &'static str,
        details: String,
    },
    /// The cookie signing key could not be decoded.
    InvalidSecretKey { details: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
            Self::Invalid { field, details } => write!(f, "invalid {field}: {details}"),
            Self::InvalidSecretKey { details } => {
                write!(f, "invalid session secret key: {details}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
