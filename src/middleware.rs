//! Application-wide middleware.
//!
//! Registration order, outermost first: security headers, request tagging,
//! access log, CORS, error handler.
mod cors;
mod error_handler;
mod rate_limit;
mod request_id;
mod security_headers;

pub use cors::cors;
pub use error_handler::error_handlers;
pub use rate_limit::{client_ip, client_ip_key, KeyFn, RateLimit, RateLimitMiddleware, RateLimitState};
pub use request_id::{tag_request, RequestId, RequestIdRootSpanBuilder};
pub use security_headers::security_headers;
