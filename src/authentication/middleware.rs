use std::ops::Deref;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use actix_web_lab::middleware::Next;

use super::session::{SessionStore, SessionWithUser};
use crate::configuration::AuthSettings;
use crate::constants::messages::UNAUTHORIZED;

/// The signed-in user and their session, available to handlers behind
/// [`is_authorized`] as `ReqData<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionWithUser);

impl Deref for AuthenticatedUser {
    type Target = SessionWithUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Reads the session token from the session cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn session_token(request: &HttpRequest, cookie_name: &str) -> Option<String> {
    if let Some(cookie) = request.cookie(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_owned());
        }
    }

    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

fn unauthorized(reason: &str) -> actix_web::Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({ "message": UNAUTHORIZED }));
    InternalError::from_response(anyhow::anyhow!(reason.to_owned()), response).into()
}

/// Rejects requests without a live session with
/// `401 {"message": "Unauthorized"}`.
pub async fn is_authorized(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let (store, settings) = match (
        req.app_data::<web::Data<SessionStore>>(),
        req.app_data::<web::Data<AuthSettings>>(),
    ) {
        (Some(store), Some(settings)) => (store.clone(), settings.clone()),
        _ => {
            tracing::error!("Session store is not configured for this scope");
            return Err(unauthorized("The session store is missing"));
        }
    };

    let token = match session_token(req.request(), &settings.session_cookie_name()) {
        Some(token) => token,
        None => return Err(unauthorized("The user has not logged in")),
    };

    match store.resolve(&token).await {
        Ok(Some(resolved)) => {
            req.extensions_mut().insert(AuthenticatedUser(resolved));
            next.call(req).await
        }
        Ok(None) => Err(unauthorized("The session is unknown or expired")),
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to authenticate user"
            );
            Err(unauthorized("The session could not be resolved"))
        }
    }
}
