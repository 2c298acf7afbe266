use anyhow::Context;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{UserEmail, UserName};

/// Public view of a user row. The password hash never leaves the database
/// layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, name, email, email_verified, created_at, updated_at";

/// Returns `None` when the email is already taken.
#[tracing::instrument(
    name = "Saving new user details in the database",
    skip(transaction, name, email, password_hash),
    fields(user_email = %email)
)]
pub async fn insert_user(
    transaction: &mut Transaction<'_, Postgres>,
    name: &UserName,
    email: &UserEmail,
    password_hash: Secret<String>,
) -> Result<Option<User>, anyhow::Error> {
    let now = Utc::now();
    let query = format!(
        r#"
        INSERT INTO users (id, name, email, email_verified, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, false, $4, $5, $5)
        ON CONFLICT (email) DO NOTHING
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&query)
        .bind(Uuid::new_v4())
        .bind(name.as_ref())
        .bind(email.as_ref())
        .bind(password_hash.expose_secret())
        .bind(now)
        .fetch_optional(&mut *transaction)
        .await
        .context("Failed to insert a new user.")
}

#[tracing::instrument(name = "Get user by email", skip(pool))]
pub async fn get_user_by_email(
    email: &UserEmail,
    pool: &PgPool,
) -> Result<Option<User>, anyhow::Error> {
    let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    sqlx::query_as::<_, User>(&query)
        .bind(email.as_ref())
        .fetch_optional(pool)
        .await
        .context("Failed to retrieve a user by email.")
}

#[tracing::instrument(name = "Get user by id", skip(pool))]
pub async fn get_user_by_id(user_id: Uuid, pool: &PgPool) -> Result<Option<User>, anyhow::Error> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to retrieve a user by id.")
}

#[tracing::instrument(name = "Mark email as verified", skip(transaction))]
pub async fn mark_email_verified(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_verified = true, updated_at = $2
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .execute(&mut *transaction)
    .await
    .context("Failed to mark the email as verified.")?;
    Ok(())
}

#[tracing::instrument(name = "Change password", skip(password_hash, transaction))]
pub async fn update_password_hash(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    password_hash: Secret<String>,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2, updated_at = $3
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(password_hash.expose_secret())
    .bind(Utc::now())
    .execute(&mut *transaction)
    .await
    .context("Failed to change user's password in the database.")?;
    Ok(())
}
