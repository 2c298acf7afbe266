use actix_web::http::header::USER_AGENT;
use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use secrecy::Secret;
use sqlx::PgPool;

use super::session_cookie;
use crate::authentication::{
    create_verification, get_user_by_id, validate_credentials, AuthError, AuthMailer, Credentials,
    SessionStore, VerificationKind,
};
use crate::configuration::{ApplicationSettings, AuthSettings};
use crate::domain::UserEmail;
use crate::routes::ApiError;
use crate::utils::RequestInfo;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(serde::Deserialize)]
pub struct SignInBody {
    email: String,
    password: Secret<String>,
}

#[tracing::instrument(
    name = "Signing in",
    skip(request, body, pool, store, mailer, settings, application),
    fields(user_email = %body.email, user_id = tracing::field::Empty)
)]
pub async fn sign_in(
    request: HttpRequest,
    body: web::Json<SignInBody>,
    pool: web::Data<PgPool>,
    store: web::Data<SessionStore>,
    mailer: web::Data<AuthMailer>,
    settings: web::Data<AuthSettings>,
    application: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, ApiError> {
    let SignInBody { email, password } = body.0;
    let email = UserEmail::parse(email)
        .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let user_id = validate_credentials(Credentials { email, password }, &pool)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(_) => ApiError::Unauthorized(INVALID_CREDENTIALS.into()),
            AuthError::UnexpectedError(e) => ApiError::Unexpected(e),
        })?;
    tracing::Span::current().record("user_id", &tracing::field::display(&user_id));

    let user = get_user_by_id(user_id, &pool)
        .await?
        .context("A user with valid credentials has no row.")?;

    if !user.email_verified {
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
        return Err(ApiError::Forbidden("Email not verified".into()));
    }

    let ip_address = request
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let (token, resolved) = store.create(&user, ip_address, user_agent).await?;

    let cookie = session_cookie(
        settings.session_cookie_name(),
        token.clone(),
        store.expires_in().num_seconds(),
        application.is_production(),
    );
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(serde_json::json!({ "token": token, "user": resolved.user })))
}
