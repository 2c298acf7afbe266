use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpMessage, HttpResponse};

use super::RequestId;
use crate::constants::messages::INTERNAL_SERVER_ERROR;

/// Catch-all for unhandled failures: every 500 is logged and its body is
/// replaced so internals never reach the client.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().handler(StatusCode::INTERNAL_SERVER_ERROR, internal_error)
}

fn internal_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let request_id = res
        .request()
        .extensions()
        .get::<RequestId>()
        .map(ToString::to_string);
    let cause = res.response().error().map(|e| format!("{:?}", e));

    tracing::error!(
        error.cause_chain = cause.as_deref(),
        http.status_code = res.status().as_u16(),
        http.path = %res.request().path(),
        http.method = %res.request().method(),
        request_id = request_id.as_deref(),
        "Unhandled error"
    );

    let (request, _) = res.into_parts();
    let response = HttpResponse::InternalServerError()
        .json(serde_json::json!({ "message": INTERNAL_SERVER_ERROR }));
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(request, response).map_into_right_body(),
    ))
}
