//! CSRF protection for state-changing requests.
//!
//! Every session carries its own random token. `authenticate` attaches it to
//! the request as a [`CsrfToken`], pages render it into a hidden
//! `csrf_token` field, and `verify_csrf` rejects any unsafe request that
//! does not echo it back in that field or in the `x-csrf-token` header.

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request},
    http::{HeaderMap, Method, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use subtle::ConstantTimeEq;
use tracing::warn;
use url::form_urlencoded;

use crate::error::AuthError;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header carrying the token for non-form requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Largest request body buffered while looking for the token.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The current session's CSRF token.
///
/// Requests without a session carry an empty token, which never verifies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares `submitted` against this token in constant time.
    #[must_use]
    pub fn matches(&self, submitted: &str) -> bool {
        !self.0.is_empty() && bool::from(self.0.as_bytes().ct_eq(submitted.as_bytes()))
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Rejects unsafe requests that do not carry the session's CSRF token.
///
/// Form bodies are buffered to read the token and handed on unchanged.
///
/// # Errors
///
/// Returns `CsrfRejected` if the token is missing, wrong, or the body cannot
/// be read.
pub async fn verify_csrf(request: Request, next: Next) -> Result<Response, AuthError> {
    if is_safe(request.method()) {
        return Ok(next.run(request).await);
    }

    let expected = request
        .extensions()
        .get::<CsrfToken>()
        .cloned()
        .unwrap_or_default();

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES).await.map_err(|e| {
        warn!(error = %e, "Failed to read request body for CSRF check");
        AuthError::CsrfRejected
    })?;

    let submitted = header_token(&parts.headers).or_else(|| {
        is_form(&parts.headers)
            .then(|| form_token(&bytes))
            .flatten()
    });

    match submitted {
        Some(submitted) if expected.matches(&submitted) => {
            Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
        }
        submitted => {
            warn!(
                method = %parts.method,
                path = parts.uri.path(),
                submitted = submitted.is_some(),
                "Rejected request with missing or invalid CSRF token"
            );
            Err(AuthError::CsrfRejected)
        }
    }
}

fn is_safe(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE].contains(method)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn form_token(body: &[u8]) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}
