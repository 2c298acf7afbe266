use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use secrecy::Secret;
use sqlx::PgPool;

use crate::authentication::{
    compute_password_hash, create_verification, insert_user, AuthMailer, VerificationKind,
};
use crate::configuration::AuthSettings;
use crate::domain::{NewUser, Password, UserEmail, UserName};
use crate::routes::ApiError;
use crate::utils::RequestInfo;

#[derive(serde::Deserialize)]
pub struct SignUpBody {
    name: String,
    email: String,
    password: Secret<String>,
}

impl SignUpBody {
    fn parse(self, settings: &AuthSettings) -> Result<NewUser, String> {
        Ok(NewUser {
            name: UserName::parse(self.name)?,
            email: UserEmail::parse(self.email)?,
            password: Password::parse(
                self.password,
                settings.min_password_length,
                settings.max_password_length,
            )?,
        })
    }
}

#[tracing::instrument(
    name = "Signing up a new user",
    skip(request, body, pool, mailer, settings),
    fields(user_email = %body.email)
)]
pub async fn sign_up(
    request: HttpRequest,
    body: web::Json<SignUpBody>,
    pool: web::Data<PgPool>,
    mailer: web::Data<AuthMailer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, ApiError> {
    let NewUser {
        name,
        email,
        password,
    } = body.0.parse(&settings).map_err(ApiError::BadRequest)?;
    let password_hash = compute_password_hash(password.into_secret()).await?;

    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;
    let user = insert_user(&mut transaction, &name, &email, password_hash)
        .await?
        .ok_or_else(|| ApiError::UnprocessableEntity("User already exists".into()))?;
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to store a new user.")?;

    let token = create_verification(
        &pool,
        VerificationKind::EmailVerification,
        user.id,
        settings.verification_lifetime(),
    )
    .await?;
    mailer
        .send_verification(&user, &token, Some(&RequestInfo::from(&request)))
        .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": null, "user": user })))
}
