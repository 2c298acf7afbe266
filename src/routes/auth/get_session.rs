use actix_web::{web, HttpRequest, HttpResponse};

use crate::authentication::{session_token, SessionStore};
use crate::configuration::AuthSettings;
use crate::routes::ApiError;

/// `{session, user}` for a live session, `null` otherwise.
#[tracing::instrument(name = "Get session", skip(request, store, settings))]
pub async fn get_session(
    request: HttpRequest,
    store: web::Data<SessionStore>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, ApiError> {
    let resolved = match session_token(&request, &settings.session_cookie_name()) {
        Some(token) => store.resolve(&token).await?,
        None => None,
    };
    Ok(HttpResponse::Ok().json(resolved))
}
