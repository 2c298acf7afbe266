use actix_web::web::ReqData;
use actix_web::HttpResponse;

use crate::authentication::AuthenticatedUser;

/// Returns the user behind the current session.
pub async fn me(authenticated: ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "user": authenticated.user }))
}
