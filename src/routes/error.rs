use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::constants::messages::{INTERNAL_SERVER_ERROR, NOT_FOUND};
use crate::utils::error_chain_fmt;

/// Error returned by every JSON route. Renders as `{"message": ...}`.
#[derive(thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Unexpected(_) => INTERNAL_SERVER_ERROR.to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "message": message }))
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "message": NOT_FOUND }))
}

/// Turns body extraction failures into `400 {"message": ...}`.
pub fn json_error_handler(
    error: actix_web::error::JsonPayloadError,
    _request: &actix_web::HttpRequest,
) -> actix_web::Error {
    ApiError::BadRequest(error.to_string()).into()
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    use super::ApiError;

    async fn body_of(error: ApiError) -> (u16, serde_json::Value) {
        let response = error.error_response();
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn client_errors_carry_their_message() {
        let (status, body) = body_of(ApiError::UnprocessableEntity("User already exists".into())).await;

        assert_eq!(status, 422);
        assert_eq!(body, serde_json::json!({ "message": "User already exists" }));
    }

    #[actix_web::test]
    async fn unexpected_errors_hide_their_cause() {
        let error = ApiError::Unexpected(anyhow::anyhow!("pool timed out"));
        let debug = format!("{:?}", error);
        let (status, body) = body_of(error).await;

        assert_eq!(status, 500);
        assert_eq!(body["message"], "Internal Server Error");
        assert!(debug.contains("pool timed out"));
    }
}
