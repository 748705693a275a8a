//! Postgres implementations of the identity registry and session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recipes_core::{ExternalId, Result, SessionToken};
use recipes_identity::{
    IdentityRegistry, RegistryError, Session, SessionStore, SessionStoreError, User, UserDetails,
};
use sqlx::{FromRow, PgPool};
use tracing::info;

fn registry_error(e: sqlx::Error) -> RegistryError {
    RegistryError::Database {
        details: e.to_string(),
    }
}

fn session_error(e: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Database {
        details: e.to_string(),
    }
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::with_all_fields(
            ExternalId::new(row.id),
            row.name,
            row.created_at,
            row.updated_at,
            row.last_login,
        )
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    token: String,
    external_id: Option<String>,
    csrf_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, SessionStoreError> {
        if self.expires_at < self.created_at {
            return Err(SessionStoreError::Corrupt {
                details: "session expires before it was created".to_string(),
            }
            .into());
        }
        Ok(Session::with_all_fields(
            SessionToken::new(self.token),
            self.external_id.map(ExternalId::new),
            self.csrf_token,
            self.created_at,
            self.expires_at,
        ))
    }
}

/// Identity registry backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgIdentityRegistry {
    pool: PgPool,
}

impl PgIdentityRegistry {
    /// Creates a new registry.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRegistry for PgIdentityRegistry {
    async fn record_log_in(&self, id: &ExternalId) -> Result<bool, RegistryError> {
        // `xmax` is zero only for a row version created by this statement.
        let created: bool = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, name, created_at, updated_at, last_login)
            VALUES ($1, '', NOW(), NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET last_login = EXCLUDED.last_login
            RETURNING (xmax = 0) AS created
            "#,
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(registry_error)?;

        info!(%id, created, "Authenticated user persisted");
        Ok(created)
    }

    async fn exists(&self, id: &ExternalId) -> Result<bool, RegistryError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(registry_error)?;

        Ok(exists)
    }

    async fn find(&self, id: &ExternalId) -> Result<Option<User>, RegistryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, created_at, updated_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(registry_error)?;

        Ok(row.map(User::from))
    }

    async fn update_details(
        &self,
        id: &ExternalId,
        details: &UserDetails,
    ) -> Result<(), RegistryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(&details.name)
        .execute(&self.pool)
        .await
        .map_err(registry_error)?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::UnknownIdentity { id: id.to_string() }.into());
        }

        info!(%id, "Updated user details");
        Ok(())
    }
}

/// Session store backed by the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, token: &SessionToken) -> Result<Option<Session>, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT token, external_id, csrf_token, created_at, expires_at
            FROM sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(session_error)?;

        row.map(SessionRow::try_into_session).transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, external_id, csrf_token, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token) DO UPDATE
            SET external_id = EXCLUDED.external_id,
                csrf_token = EXCLUDED.csrf_token,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.token().as_str())
        .bind(session.identity().map(ExternalId::as_str))
        .bind(session.csrf_token())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(session_error)?;

        Ok(())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(session_error)?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(session_error)?;

        Ok(result.rows_affected())
    }
}
