//! Authentication for the recipes server.
//!
//! This module provides:
//! - Single-use login nonces carried in a short-lived cookie (`nonce`)
//! - The OAuth client for the identity provider (`oauth`)
//! - Signed-cookie sessions with token rotation on log-in and log-out (`session`)
//! - The callback state machine that turns a provider redirect into a session (`callback`)
//! - Middleware that resolves and enforces the request's `AuthContext` (`middleware`)
//! - Per-session CSRF tokens checked on unsafe requests (`csrf`)
//! - Postgres-backed identity registry and session store (`db`)

pub mod callback;
pub mod csrf;
pub mod db;
pub mod middleware;
pub mod nonce;
pub mod oauth;
pub mod routes;
pub mod session;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use recipes_identity::IdentityRegistry;
use std::sync::Arc;

pub use callback::{Callback, CallbackParams, CallbackStage, Destination};
pub use csrf::{CsrfToken, verify_csrf};
pub use middleware::{Auth, RequireUser, authenticate, require_authentication};
pub use nonce::NonceGuard;
pub use oauth::{GoogleOAuthClient, OAuthClient, OAuthError};
pub use session::SessionManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Identity registry.
    pub registry: Arc<dyn IdentityRegistry>,
    /// Session manager.
    pub sessions: SessionManager,
    /// OAuth client for the identity provider.
    pub oauth: Arc<dyn OAuthClient>,
    /// Login nonce issuer.
    pub nonces: NonceGuard,
    /// Key signing the session cookie.
    cookie_key: Key,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        registry: Arc<dyn IdentityRegistry>,
        sessions: SessionManager,
        oauth: Arc<dyn OAuthClient>,
        nonces: NonceGuard,
        cookie_key: Key,
    ) -> Self {
        Self {
            registry,
            sessions,
            oauth,
            nonces,
            cookie_key,
        }
    }

    /// Returns the collaborators a callback runs against.
    #[must_use]
    pub fn callback(&self) -> Callback<'_> {
        Callback {
            oauth: self.oauth.as_ref(),
            registry: self.registry.as_ref(),
            sessions: &self.sessions,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
