//! HTTP-facing error type for the authentication flow.
//!
//! Collaborators return rootcause reports with their own domain contexts.
//! Handlers fold those into `AuthError`, which logs the detail server-side and
//! renders a response that leaks nothing beyond the failure class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use recipes_identity::{RegistryError, SessionStoreError};
use rootcause::prelude::Report;
use std::fmt;

use crate::auth::oauth::OAuthError;

/// Body returned for rejected callbacks.
pub const INVALID_OAUTH_REQUEST: &str = "Invalid OAuth request.";

/// Body returned for state-changing requests without a valid CSRF token.
pub const INVALID_CSRF_TOKEN: &str = "Invalid CSRF token.";

/// Body returned for every server-side failure.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    /// The callback arrived without a readable nonce cookie.
    NonceMissing,
    /// The nonce echoed in `state` does not match the issued one.
    NonceMismatch,
    /// The authorization code could not be exchanged for a token.
    TokenExchangeFailed { details: String },
    /// The provider's profile endpoint failed or returned no identity.
    IdentityFetchFailed { details: String },
    /// The identity registry failed.
    Registry { details: String },
    /// The session store failed.
    SessionStore { details: String },
    /// A protected handler ran without an authenticated context.
    NotAuthenticated,
    /// An unsafe request did not echo its session's CSRF token.
    CsrfRejected,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonceMissing => write!(f, "login nonce missing"),
            Self::NonceMismatch => write!(f, "login nonce mismatch"),
            Self::TokenExchangeFailed { details } => {
                write!(f, "token exchange failed: {details}")
            }
            Self::IdentityFetchFailed { details } => {
                write!(f, "identity fetch failed: {details}")
            }
            Self::Registry { details } => write!(f, "identity registry error: {details}"),
            Self::SessionStore { details } => write!(f, "session store error: {details}"),
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::CsrfRejected => write!(f, "CSRF token missing or invalid"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<Report<RegistryError>> for AuthError {
    fn from(report: Report<RegistryError>) -> Self {
        Self::Registry {
            details: report.to_string(),
        }
    }
}

impl From<Report<SessionStoreError>> for AuthError {
    fn from(report: Report<SessionStoreError>) -> Self {
        Self::SessionStore {
            details: report.to_string(),
        }
    }
}

impl AuthError {
    /// Wraps a failed code exchange.
    pub fn token_exchange(report: &Report<OAuthError>) -> Self {
        Self::TokenExchangeFailed {
            details: report.to_string(),
        }
    }

    /// Wraps a failed identity fetch.
    pub fn identity_fetch(report: &Report<OAuthError>) -> Self {
        Self::IdentityFetchFailed {
            details: report.to_string(),
        }
    }

    /// Returns the status code this error renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NonceMissing | Self::NonceMismatch | Self::CsrfRejected => {
                StatusCode::BAD_REQUEST
            }
            Self::NotAuthenticated => StatusCode::SEE_OTHER,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::NonceMissing | Self::NonceMismatch => {
                (status, INVALID_OAUTH_REQUEST).into_response()
            }
            Self::CsrfRejected => (status, INVALID_CSRF_TOKEN).into_response(),
            Self::NotAuthenticated => Redirect::to("/auth/login").into_response(),
            other => {
                tracing::error!(error = %other, "Authentication request failed");
                (status, INTERNAL_ERROR).into_response()
            }
        }
    }
}
