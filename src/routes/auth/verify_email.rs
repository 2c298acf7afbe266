use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;

use crate::authentication::{consume_verification, mark_email_verified, VerificationKind};
use crate::routes::ApiError;

#[derive(serde::Deserialize)]
pub struct Parameters {
    token: String,
}

#[tracing::instrument(name = "Verify email", skip(parameters, pool))]
pub async fn verify_email(
    parameters: web::Query<Parameters>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;
    let user_id = consume_verification(
        &mut transaction,
        VerificationKind::EmailVerification,
        &parameters.token,
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid token".into()))?;
    mark_email_verified(&mut transaction, user_id).await?;
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to verify an email.")?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": true })))
}
