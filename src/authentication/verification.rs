use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::token::{generate_token, hash_token};

/// What a verification token authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationKind {
    EmailVerification,
    ResetPassword,
}

impl VerificationKind {
    fn prefix(&self) -> &'static str {
        match self {
            VerificationKind::EmailVerification => "email-verification",
            VerificationKind::ResetPassword => "reset-password",
        }
    }

    pub fn identifier(&self, user_id: Uuid) -> String {
        format!("{}:{}", self.prefix(), user_id)
    }

    /// Recovers the user id from an identifier of this kind.
    pub fn user_id(&self, identifier: &str) -> Option<Uuid> {
        identifier
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|user_id| Uuid::parse_str(user_id).ok())
    }
}

/// Stores a fresh token for `user_id` and returns it in clear text.
///
/// Older tokens of the same kind for the same user are dropped.
#[tracing::instrument(name = "Create verification token", skip(pool))]
pub async fn create_verification(
    pool: &PgPool,
    kind: VerificationKind,
    user_id: Uuid,
    expires_in: Duration,
) -> Result<String, anyhow::Error> {
    let identifier = kind.identifier(user_id);
    let token = generate_token();
    let now = Utc::now();
    let expires_at = now
        + chrono::Duration::from_std(expires_in).context("Verification lifetime is out of range.")?;

    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool.")?;
    sqlx::query("DELETE FROM verifications WHERE identifier = $1")
        .bind(&identifier)
        .execute(&mut transaction)
        .await
        .context("Failed to drop previous verification tokens.")?;
    sqlx::query(
        r#"
        INSERT INTO verifications (id, identifier, value, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&identifier)
    .bind(hash_token(&token))
    .bind(expires_at)
    .bind(now)
    .execute(&mut transaction)
    .await
    .context("Failed to store a new verification token.")?;
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to store a verification token.")?;

    Ok(token)
}

/// Deletes the token and returns the user it was issued to.
///
/// Unknown, expired and wrong-kind tokens all yield `None`. A token can be
/// consumed at most once.
#[tracing::instrument(name = "Consume verification token", skip(transaction, token))]
pub async fn consume_verification(
    transaction: &mut Transaction<'_, Postgres>,
    kind: VerificationKind,
    token: &str,
) -> Result<Option<Uuid>, anyhow::Error> {
    let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
        r#"
        DELETE FROM verifications
        WHERE value = $1
        RETURNING identifier, expires_at
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(&mut *transaction)
    .await
    .context("Failed to consume a verification token.")?;

    Ok(row.and_then(|(identifier, expires_at)| {
        if expires_at <= Utc::now() {
            return None;
        }
        kind.user_id(&identifier)
    }))
}
