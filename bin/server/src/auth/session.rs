//! Cookie-backed session management.
//!
//! The session cookie is signed and carries only the session token. Every
//! change of authentication state (log-in, log-out) discards the old record
//! and mints a new token, so a token planted before log-in never becomes an
//! authenticated one.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use recipes_core::{ExternalId, SessionToken};
use recipes_identity::{Session, SessionStore, SessionStoreError};
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::Duration;
use time::Duration as TimeDuration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SessionConfig;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "recipes.session";

/// Binds identities to sessions and rotates session tokens.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    duration_minutes: i64,
    secure_cookies: bool,
}

impl SessionManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            duration_minutes: config.duration_minutes,
            secure_cookies: config.secure_cookies,
        }
    }

    /// Returns the token carried by the request's session cookie, if any.
    #[must_use]
    pub fn current_token(jar: &SignedCookieJar) -> Option<SessionToken> {
        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .map(SessionToken::new)
    }

    /// Loads the request's session unless it is missing, unknown or expired.
    ///
    /// The identity bound to the result, if any, is the request's identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn current_session(
        &self,
        jar: &SignedCookieJar,
    ) -> Result<Option<Session>, Report<SessionStoreError>> {
        let Some(token) = Self::current_token(jar) else {
            return Ok(None);
        };

        let session = self.store.load(&token).await?;
        Ok(session.filter(|session| !session.is_expired()))
    }

    /// Binds `identity` to a freshly minted session.
    ///
    /// The token always changes, even if the caller was already logged in
    /// as the same identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the old session cannot be discarded or the new
    /// one cannot be saved. The request must fail in that case.
    pub async fn establish(
        &self,
        jar: SignedCookieJar,
        identity: ExternalId,
    ) -> Result<SignedCookieJar, Report<SessionStoreError>> {
        self.renew(jar, Some(identity)).await
    }

    /// Unbinds the identity and rotates the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn clear(
        &self,
        jar: SignedCookieJar,
    ) -> Result<SignedCookieJar, Report<SessionStoreError>> {
        self.renew(jar, None).await
    }

    async fn renew(
        &self,
        jar: SignedCookieJar,
        identity: Option<ExternalId>,
    ) -> Result<SignedCookieJar, Report<SessionStoreError>> {
        if let Some(previous) = Self::current_token(&jar) {
            self.store.delete(&previous).await?;
        }

        let session = Session::new(
            SessionToken::generate(),
            identity,
            chrono::Duration::minutes(self.duration_minutes),
        );
        self.store.save(&session).await?;

        debug!(
            authenticated = session.identity().is_some(),
            "Renewed session token"
        );
        Ok(jar.add(self.cookie(session.token())))
    }

    fn cookie(&self, token: &SessionToken) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.as_str().to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::minutes(self.duration_minutes))
            .build()
    }
}

/// Spawns the periodic expired-session sweep.
///
/// The first sweep runs immediately.
pub fn spawn_cleanup(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        loop {
            interval.tick().await;
            match store.delete_expired().await {
                Ok(count) if count > 0 => {
                    debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    })
}
