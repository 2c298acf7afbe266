use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use secrecy::Secret;
use sqlx::PgPool;

use crate::authentication::{
    compute_password_hash, consume_verification, create_verification, get_user_by_email,
    get_user_by_id, update_password_hash, AuthMailer, SessionStore, VerificationKind,
};
use crate::configuration::AuthSettings;
use crate::domain::{Password, UserEmail};
use crate::routes::ApiError;
use crate::utils::RequestInfo;

#[derive(serde::Deserialize)]
pub struct RequestPasswordResetBody {
    email: String,
}

/// Always answers `{status: true}` so the response does not reveal whether
/// the address is registered.
#[tracing::instrument(
    name = "Requesting a password reset",
    skip(request, body, pool, mailer, settings),
    fields(user_email = %body.email)
)]
pub async fn request_password_reset(
    request: HttpRequest,
    body: web::Json<RequestPasswordResetBody>,
    pool: web::Data<PgPool>,
    mailer: web::Data<AuthMailer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, ApiError> {
    let response = HttpResponse::Ok().json(serde_json::json!({ "status": true }));

    let email = match UserEmail::parse(body.0.email) {
        Ok(email) => email,
        Err(_) => return Ok(response),
    };
    let user = match get_user_by_email(&email, &pool).await? {
        Some(user) => user,
        None => {
            tracing::info!("Password reset requested for an unknown email");
            return Ok(response);
        }
    };

    let token = create_verification(
        &pool,
        VerificationKind::ResetPassword,
        user.id,
        settings.verification_lifetime(),
    )
    .await?;
    mailer
        .send_reset_password(&user, &token, Some(&RequestInfo::from(&request)))
        .await;

    Ok(response)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    token: String,
    new_password: Secret<String>,
}

#[tracing::instrument(
    name = "Resetting a password",
    skip(request, body, pool, store, mailer, settings),
    fields(user_id = tracing::field::Empty)
)]
pub async fn reset_password(
    request: HttpRequest,
    body: web::Json<ResetPasswordBody>,
    pool: web::Data<PgPool>,
    store: web::Data<SessionStore>,
    mailer: web::Data<AuthMailer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, ApiError> {
    let ResetPasswordBody {
        token,
        new_password,
    } = body.0;
    let new_password = Password::parse(
        new_password,
        settings.min_password_length,
        settings.max_password_length,
    )
    .map_err(ApiError::BadRequest)?;
    let password_hash = compute_password_hash(new_password.into_secret()).await?;

    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;
    let user_id = consume_verification(&mut transaction, VerificationKind::ResetPassword, &token)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid token".into()))?;
    tracing::Span::current().record("user_id", &tracing::field::display(&user_id));
    update_password_hash(&mut transaction, user_id, password_hash).await?;
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to reset a password.")?;

    store.revoke_all(user_id).await?;

    if let Some(user) = get_user_by_id(user_id, &pool).await? {
        mailer
            .send_password_reset_notice(&user, Some(&RequestInfo::from(&request)))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": true })))
}
