//! Server-side session records and their storage contract.
//!
//! The session cookie carries only a `SessionToken`; the record behind it
//! holds the bound identity (if any), the form token for that session and
//! the expiry. A session with no bound identity is anonymous.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use recipes_core::{ExternalId, Result, SessionToken, random_token};
use serde::{Deserialize, Serialize};

use crate::error::SessionStoreError;

/// Number of random bytes in a CSRF token.
const CSRF_TOKEN_BYTES: usize = 32;

/// A server-side session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Token carried by the session cookie.
    token: SessionToken,
    /// Identity bound to this session, if the holder has logged in.
    identity: Option<ExternalId>,
    /// Token that state-changing form submissions must echo back.
    csrf_token: String,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session valid for `duration` from now.
    #[must_use]
    pub fn new(token: SessionToken, identity: Option<ExternalId>, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            token,
            identity,
            csrf_token: random_token(CSRF_TOKEN_BYTES),
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Creates a session with all fields specified.
    ///
    /// Use this when reconstituting a session from storage.
    #[must_use]
    pub fn with_all_fields(
        token: SessionToken,
        identity: Option<ExternalId>,
        csrf_token: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            identity,
            csrf_token,
            created_at,
            expires_at,
        }
    }

    /// Returns the session token.
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Returns the bound identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ExternalId> {
        self.identity.as_ref()
    }

    /// Returns the session's CSRF token.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Persistence for sessions.
///
/// Implementations own their concurrency control. Tokens are unique, so
/// concurrent requests never contend over the same record except when a
/// browser replays an old cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the session for `token`, if one exists.
    async fn load(&self, token: &SessionToken) -> Result<Option<Session>, SessionStoreError>;

    /// Inserts or replaces a session.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Deletes the session for `token`. Deleting a missing session is not an error.
    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError>;

    /// Deletes expired sessions, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_correct_fields() {
        let token = SessionToken::generate();
        let identity = ExternalId::new("108234");

        let before = Utc::now();
        let session = Session::new(token.clone(), Some(identity.clone()), Duration::hours(1));
        let after = Utc::now();

        assert_eq!(session.token(), &token);
        assert_eq!(session.identity(), Some(&identity));
        assert!(session.created_at() >= before);
        assert!(session.created_at() <= after);
        assert!(session.expires_at() > session.created_at());
    }

    #[test]
    fn each_session_gets_its_own_csrf_token() {
        let first = Session::new(SessionToken::generate(), None, Duration::hours(1));
        let second = Session::new(SessionToken::generate(), None, Duration::hours(1));

        assert!(!first.csrf_token().is_empty());
        assert_ne!(first.csrf_token(), second.csrf_token());
        assert_ne!(first.csrf_token(), first.token().as_str());
    }

    #[test]
    fn negative_duration_is_already_expired() {
        let session = Session::new(
            SessionToken::generate(),
            Some(ExternalId::new("108234")),
            Duration::seconds(-1),
        );

        assert!(session.is_expired());
    }

    #[test]
    fn valid_session_is_not_expired() {
        let session = Session::new(
            SessionToken::generate(),
            Some(ExternalId::new("108234")),
            Duration::hours(1),
        );

        assert!(!session.is_expired());
        assert_eq!(session.identity().map(ExternalId::as_str), Some("108234"));
    }

    #[test]
    fn anonymous_session_has_no_identity() {
        let session = Session::new(SessionToken::generate(), None, Duration::hours(1));
        assert!(session.identity().is_none());
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = Session::new(
            SessionToken::generate(),
            Some(ExternalId::new("108234")),
            Duration::hours(1),
        );

        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: Session = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(session, parsed);
    }
}
