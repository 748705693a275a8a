//! In-memory implementations of the storage contracts.
//!
//! Used for local development and tests. Each map sits behind a single
//! mutex, so every operation is atomic with respect to the others.

use async_trait::async_trait;
use recipes_core::{ExternalId, Result, SessionToken};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{RegistryError, SessionStoreError};
use crate::registry::IdentityRegistry;
use crate::session::{Session, SessionStore};
use crate::user::{User, UserDetails};

/// Identity registry backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryIdentityRegistry {
    users: Mutex<HashMap<ExternalId, User>>,
}

impl MemoryIdentityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the record for `id`, as an account deletion would.
    pub async fn remove(&self, id: &ExternalId) -> Option<User> {
        self.users.lock().await.remove(id)
    }

    /// Returns the number of known identities.
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Returns true if no identities are known.
    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

#[async_trait]
impl IdentityRegistry for MemoryIdentityRegistry {
    async fn record_log_in(&self, id: &ExternalId) -> Result<bool, RegistryError> {
        let mut users = self.users.lock().await;
        let mut created = false;
        let user = users.entry(id.clone()).or_insert_with(|| {
            created = true;
            User::new(id.clone())
        });
        user.record_login();

        info!(%id, created, "Authenticated user persisted");
        Ok(created)
    }

    async fn exists(&self, id: &ExternalId) -> Result<bool, RegistryError> {
        Ok(self.users.lock().await.contains_key(id))
    }

    async fn find(&self, id: &ExternalId) -> Result<Option<User>, RegistryError> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn update_details(
        &self,
        id: &ExternalId,
        details: &UserDetails,
    ) -> Result<(), RegistryError> {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(id) else {
            return Err(RegistryError::UnknownIdentity { id: id.to_string() }.into());
        };
        user.apply_details(details);

        info!(%id, "Updated user details");
        Ok(())
    }
}

/// Session store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionToken, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &SessionToken) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions
            .lock()
            .await
            .insert(session.token().clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}
