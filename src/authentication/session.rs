//! Sessions live in Postgres and are mirrored in Redis under
//! `session:<token hash>` until they expire.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::token::{generate_token, hash_token};
use super::users::User;
use crate::cache::Cache;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A session is refreshed once `update_age` has passed since its expiry
    /// was last set.
    fn needs_refresh(&self, now: DateTime<Utc>, update_age: chrono::Duration) -> bool {
        now - self.updated_at >= update_age
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionWithUser {
    pub session: Session,
    pub user: User,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    name: String,
    email: String,
    email_verified: bool,
    user_created_at: DateTime<Utc>,
    user_updated_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionWithUser {
    fn from(row: SessionRow) -> Self {
        Self {
            session: Session {
                id: row.id,
                user_id: row.user_id,
                expires_at: row.expires_at,
                ip_address: row.ip_address,
                user_agent: row.user_agent,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            user: User {
                id: row.user_id,
                name: row.name,
                email: row.email,
                email_verified: row.email_verified,
                created_at: row.user_created_at,
                updated_at: row.user_updated_at,
            },
        }
    }
}

/// Issues, resolves and revokes sessions.
#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
    cache: Cache,
    expires_in: chrono::Duration,
    update_age: chrono::Duration,
}

impl SessionStore {
    pub fn new(pool: PgPool, cache: Cache, expires_in: Duration, update_age: Duration) -> Self {
        Self {
            pool,
            cache,
            expires_in: chrono::Duration::from_std(expires_in)
                .unwrap_or_else(|_| chrono::Duration::days(7)),
            update_age: chrono::Duration::from_std(update_age)
                .unwrap_or_else(|_| chrono::Duration::days(1)),
        }
    }

    /// Session lifetime, used for the cookie `Max-Age`.
    pub fn expires_in(&self) -> chrono::Duration {
        self.expires_in
    }

    fn cache_key(token: &str) -> String {
        format!("session:{}", hash_token(token))
    }

    /// Creates a session for `user` and returns its clear-text token.
    #[tracing::instrument(name = "Create session", skip(self, user), fields(user_id = %user.id))]
    pub async fn create(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(String, SessionWithUser), anyhow::Error> {
        let token = generate_token();
        let now = Utc::now();
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions
                (id, token, user_id, expires_at, ip_address, user_agent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, user_id, expires_at, ip_address, user_agent, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(&token))
        .bind(user.id)
        .bind(now + self.expires_in)
        .bind(ip_address)
        .bind(user_agent)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to store a new session.")?;

        let resolved = SessionWithUser {
            session,
            user: user.clone(),
        };
        self.cache_session(&token, &resolved).await;
        Ok((token, resolved))
    }

    /// Looks the token up in Redis, then in Postgres. Expired sessions are
    /// deleted and reported as missing. Sessions past their update age get
    /// a fresh expiry.
    #[tracing::instrument(name = "Resolve session", skip(self, token))]
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionWithUser>, anyhow::Error> {
        let now = Utc::now();
        let resolved = match self.cached_session(token).await {
            Some(resolved) => Some(resolved),
            None => self.stored_session(token).await?,
        };

        let resolved = match resolved {
            Some(resolved) => resolved,
            None => return Ok(None),
        };

        if resolved.session.is_expired(now) {
            self.revoke(token).await?;
            return Ok(None);
        }

        if resolved.session.needs_refresh(now, self.update_age) {
            return self.refresh(token, resolved, now).await.map(Some);
        }

        Ok(Some(resolved))
    }

    async fn cached_session(&self, token: &str) -> Option<SessionWithUser> {
        let raw = self.cache.get(&Self::cache_key(token)).await?;
        match serde_json::from_str(&raw) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::warn!(error.message = %e, "Discarding an unreadable cached session");
                None
            }
        }
    }

    async fn stored_session(&self, token: &str) -> Result<Option<SessionWithUser>, anyhow::Error> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.id, s.user_id, s.expires_at, s.ip_address, s.user_agent,
                   s.created_at, s.updated_at,
                   u.name, u.email, u.email_verified,
                   u.created_at AS user_created_at, u.updated_at AS user_updated_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to retrieve a session.")?;

        let resolved = row.map(SessionWithUser::from);
        if let Some(resolved) = &resolved {
            self.cache_session(token, resolved).await;
        }
        Ok(resolved)
    }

    async fn refresh(
        &self,
        token: &str,
        mut resolved: SessionWithUser,
        now: DateTime<Utc>,
    ) -> Result<SessionWithUser, anyhow::Error> {
        let expires_at = now + self.expires_in;
        sqlx::query("UPDATE sessions SET expires_at = $2, updated_at = $3 WHERE token = $1")
            .bind(hash_token(token))
            .bind(expires_at)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to extend a session.")?;

        resolved.session.expires_at = expires_at;
        resolved.session.updated_at = now;
        self.cache_session(token, &resolved).await;
        Ok(resolved)
    }

    async fn cache_session(&self, token: &str, resolved: &SessionWithUser) {
        let ttl = match (resolved.session.expires_at - Utc::now()).to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => return,
        };
        match serde_json::to_string(resolved) {
            Ok(raw) => self.cache.set(&Self::cache_key(token), &raw, Some(ttl)).await,
            Err(e) => tracing::warn!(error.message = %e, "Failed to serialize a session"),
        }
    }

    #[tracing::instrument(name = "Revoke session", skip(self, token))]
    pub async fn revoke(&self, token: &str) -> Result<(), anyhow::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await
            .context("Failed to delete a session.")?;
        self.cache.delete(&Self::cache_key(token)).await;
        Ok(())
    }

    /// Signs the user out everywhere.
    #[tracing::instrument(name = "Revoke every session of a user", skip(self))]
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<(), anyhow::Error> {
        let hashes: Vec<(String,)> =
            sqlx::query_as("DELETE FROM sessions WHERE user_id = $1 RETURNING token")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to delete the user's sessions.")?;
        for (hash,) in hashes {
            self.cache.delete(&format!("session:{}", hash)).await;
        }
        Ok(())
    }
}
