use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use actix_web_lab::middleware::Next;
use tracing::Span;
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use uuid::Uuid;

use crate::constants::REQUEST_ID_HEADER;

/// Correlation id of the current request, as echoed in `X-Request-ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_request(req: &ServiceRequest) -> Self {
        let incoming = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match incoming {
            Some(id) => Self(id.to_owned()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reuses the caller's `X-Request-ID` or mints a new one, then makes it
/// visible to the rest of the stack and to the client.
pub async fn tag_request(
    mut req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let request_id = RequestId::from_request(&req);
    let header_value = HeaderValue::from_str(request_id.as_str())?;
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    req.headers_mut()
        .insert(header_name.clone(), header_value.clone());
    req.extensions_mut().insert(request_id);

    // Errors raised by inner middleware are rendered here so they carry the
    // id as well. The request must not be cloned before routing.
    match next.call(req).await {
        Ok(mut response) => {
            response.headers_mut().insert(header_name, header_value);
            Ok(response)
        }
        Err(e) => {
            let mut response = e.error_response();
            response.headers_mut().insert(header_name, header_value);
            Err(InternalError::from_response(e, response).into())
        }
    }
}

/// Root span for `TracingLogger` that also carries our request id.
///
/// `tracing-actix-web` already records its own `request_id`, so ours goes
/// into `x_request_id` to match what clients see.
pub struct RequestIdRootSpanBuilder;

impl RootSpanBuilder for RequestIdRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let x_request_id = request
            .extensions()
            .get::<RequestId>()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing_actix_web::root_span!(request, x_request_id = %x_request_id)
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}
