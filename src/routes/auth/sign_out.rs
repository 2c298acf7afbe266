use actix_web::{web, HttpRequest, HttpResponse};

use super::session_cookie;
use crate::authentication::{session_token, SessionStore};
use crate::configuration::{ApplicationSettings, AuthSettings};
use crate::routes::ApiError;

#[tracing::instrument(name = "Signing out", skip(request, store, settings, application))]
pub async fn sign_out(
    request: HttpRequest,
    store: web::Data<SessionStore>,
    settings: web::Data<AuthSettings>,
    application: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, ApiError> {
    let cookie_name = settings.session_cookie_name();
    if let Some(token) = session_token(&request, &cookie_name) {
        store.revoke(&token).await?;
    }

    let mut cookie = session_cookie(cookie_name, String::new(), 0, application.is_production());
    cookie.make_removal();
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(serde_json::json!({ "success": true })))
}
