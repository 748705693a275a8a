//! The OAuth callback state machine.
//!
//! A callback walks through nonce verification, token exchange, identity
//! fetch, log-in recording and session establishment, in that order. The
//! first failing stage ends the callback; nothing is retried, and the user
//! starts over from `/auth/login` with a fresh nonce.

use axum_extra::extract::cookie::SignedCookieJar;
use recipes_identity::{IdentityRegistry, LoginState};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, error, info};

use super::nonce;
use super::oauth::OAuthClient;
use super::session::SessionManager;
use crate::error::AuthError;

/// Where new users finish registering.
pub const COMPLETE_REGISTRATION_PATH: &str = "/auth/complete-registration";

/// Query parameters sent by the provider to the callback.
///
/// Both fields are optional so that a malformed callback still reaches the
/// state machine and consumes the nonce.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Stages of the callback, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    NonceVerification,
    TokenExchange,
    IdentityFetch,
    LoginRecording,
    SessionEstablishment,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NonceVerification => "nonce_verification",
            Self::TokenExchange => "token_exchange",
            Self::IdentityFetch => "identity_fetch",
            Self::LoginRecording => "login_recording",
            Self::SessionEstablishment => "session_establishment",
        };
        f.write_str(name)
    }
}

/// Where the browser goes after a successful callback.
///
/// Only the log-in that creates the user record goes to registration. A
/// returning user who never finished registering goes to `next` like any
/// other, and the index page links them back to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// First log-in: the user must pick a display name.
    CompleteRegistration,
    /// Returning user: back to the page that started the login.
    Next(String),
}

impl Destination {
    /// Returns the redirect target.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::CompleteRegistration => COMPLETE_REGISTRATION_PATH,
            Self::Next(next) => next,
        }
    }
}

/// The collaborators a callback runs against.
pub struct Callback<'a> {
    pub oauth: &'a dyn OAuthClient,
    pub registry: &'a dyn IdentityRegistry,
    pub sessions: &'a SessionManager,
}

impl Callback<'_> {
    /// Runs the callback to completion or to its first failure.
    ///
    /// `expected_nonce` is the outcome of consuming the nonce cookie; the
    /// caller must already have arranged for that cookie to be expired.
    ///
    /// # Errors
    ///
    /// Nonce failures are `NonceMissing`/`NonceMismatch`; every later stage
    /// fails with its own `AuthError` variant.
    pub async fn run(
        &self,
        expected_nonce: Result<String, AuthError>,
        params: CallbackParams,
        jar: SignedCookieJar,
    ) -> Result<(SignedCookieJar, Destination), AuthError> {
        let state = LoginState::decode(params.state.as_deref().unwrap_or_default());
        let expected = expected_nonce?;
        nonce::verify(&expected, state.nonce())?;
        debug!(stage = %CallbackStage::NonceVerification, "Login nonce verified");

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed {
                details: "callback has no authorization code".to_string(),
            })
            .inspect_err(|e| fail(CallbackStage::TokenExchange, e))?;

        let token = self
            .oauth
            .exchange_code(&code)
            .await
            .map_err(|report| AuthError::token_exchange(&report))
            .inspect_err(|e| fail(CallbackStage::TokenExchange, e))?;

        let identity = self
            .oauth
            .fetch_identity(&token)
            .await
            .map_err(|report| AuthError::identity_fetch(&report))
            .inspect_err(|e| fail(CallbackStage::IdentityFetch, e))?;

        let is_new_user = self
            .registry
            .record_log_in(&identity)
            .await
            .map_err(AuthError::from)
            .inspect_err(|e| fail(CallbackStage::LoginRecording, e))?;

        let jar = self
            .sessions
            .establish(jar, identity.clone())
            .await
            .map_err(AuthError::from)
            .inspect_err(|e| fail(CallbackStage::SessionEstablishment, e))?;

        info!(%identity, is_new_user, "User logged in");

        let destination = if is_new_user {
            Destination::CompleteRegistration
        } else {
            Destination::Next(state.destination().to_string())
        };
        debug!(destination = destination.path(), "Redirecting completed OAuth callback");

        Ok((jar, destination))
    }
}

fn fail(stage: CallbackStage, err: &AuthError) {
    error!(%stage, error = %err, "OAuth callback failed");
}
