//! Single-use login nonces.
//!
//! A nonce is issued into a short-lived cookie when login starts and echoed
//! back by the provider inside `state`. The callback consumes the cookie
//! before looking at anything else, so a nonce can be matched at most once.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use recipes_core::random_token;
use time::Duration as TimeDuration;
use tracing::{info, warn};

use crate::error::AuthError;

/// Nonce cookie name.
pub const NONCE_COOKIE: &str = "recipes.state";

/// Random bytes per nonce.
const NONCE_BYTES: usize = 32;

/// How long a login attempt may take before the nonce lapses.
const NONCE_MAX_AGE_MINUTES: i64 = 5;

/// Issues and consumes login nonces.
#[derive(Debug, Clone, Copy)]
pub struct NonceGuard {
    secure_cookies: bool,
}

impl NonceGuard {
    /// Creates a guard. `secure_cookies` sets the Secure flag on the cookie.
    #[must_use]
    pub fn new(secure_cookies: bool) -> Self {
        Self { secure_cookies }
    }

    /// Generates a nonce and the cookie that carries it.
    ///
    /// The cookie is `SameSite=Lax`: the callback is a cross-site top-level
    /// navigation from the provider, which `Strict` would strip.
    #[must_use]
    pub fn issue(&self) -> (String, Cookie<'static>) {
        let nonce = random_token(NONCE_BYTES);
        let cookie = Cookie::build((NONCE_COOKIE, nonce.clone()))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::minutes(NONCE_MAX_AGE_MINUTES))
            .build();
        (nonce, cookie)
    }

    /// Reads the issued nonce and expires its cookie.
    ///
    /// The returned jar always carries the expiring cookie, whether or not a
    /// nonce was present; callers must send it with every response.
    pub fn consume(&self, jar: CookieJar) -> (CookieJar, Result<String, AuthError>) {
        let nonce = jar
            .get(NONCE_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());

        let expired = Cookie::build((NONCE_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::ZERO);
        let jar = jar.add(expired);

        match nonce {
            Some(nonce) => (jar, Ok(nonce)),
            None => {
                info!("OAuth callback without a login nonce");
                (jar, Err(AuthError::NonceMissing))
            }
        }
    }
}

/// Compares the issued nonce with the one echoed by the provider.
///
/// # Errors
///
/// Returns `NonceMismatch` if the values differ. Both values are logged.
pub fn verify(expected: &str, received: &str) -> Result<(), AuthError> {
    if expected.is_empty() || expected != received {
        warn!(expected, received, "OAuth state nonce mismatch");
        return Err(AuthError::NonceMismatch);
    }
    Ok(())
}
