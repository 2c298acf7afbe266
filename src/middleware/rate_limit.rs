//! Fixed-window rate limiting backed by the Redis cache.
//!
//! Every request increments `ratelimit:<client ip>` (or whatever the key
//! function returns). Once the count passes the limit the request is
//! answered with `429` until the window resets. Responses advertise the
//! quota through the IETF draft-8 `RateLimit-Policy` and `RateLimit`
//! headers, including on responses rejected further in. When Redis is
//! unreachable requests go through unthrottled.

use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::InternalError;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, HttpResponse};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::cache::Cache;
use crate::configuration::RateLimitSettings;
use crate::constants::messages::TOO_MANY_REQUESTS;

const RATE_LIMIT_POLICY: &str = "ratelimit-policy";
const RATE_LIMIT: &str = "ratelimit";

/// Derives the counter key for a request.
pub type KeyFn = fn(&ServiceRequest) -> String;

pub fn client_ip(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Keys requests by the peer IP address.
pub fn client_ip_key(req: &ServiceRequest) -> String {
    format!("ratelimit:{}", client_ip(req))
}

/// Where a client stands in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u64,
    pub window: u64,
    pub hits: u64,
    /// Seconds until the window resets.
    pub reset: u64,
}

impl RateLimitState {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.hits)
    }

    pub fn is_exceeded(&self) -> bool {
        self.hits > self.limit
    }

    fn policy_name(&self) -> String {
        format!("\"{}-in-{}sec\"", self.limit, self.window)
    }

    pub fn policy_header(&self) -> String {
        format!("{}; q={}; w={}", self.policy_name(), self.limit, self.window)
    }

    pub fn state_header(&self) -> String {
        format!(
            "{}; r={}; t={}",
            self.policy_name(),
            self.remaining(),
            self.reset
        )
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        let pairs = [
            (RATE_LIMIT_POLICY, self.policy_header()),
            (RATE_LIMIT, self.state_header()),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
    }
}

/// Rate limiting middleware.
///
/// ```ignore
/// App::new().wrap(RateLimit::new(cache, settings.rate_limit))
/// ```
#[derive(Clone)]
pub struct RateLimit {
    cache: Cache,
    settings: RateLimitSettings,
    key_fn: KeyFn,
}

impl RateLimit {
    pub fn new(cache: Cache, settings: RateLimitSettings) -> Self {
        Self {
            cache,
            settings,
            key_fn: client_ip_key,
        }
    }

    /// Replaces the default per-IP key.
    pub fn key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            cache: self.cache.clone(),
            settings: self.settings,
            key_fn: self.key_fn,
        }))
    }
}

/// Service wrapper produced by [`RateLimit`].
pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    cache: Cache,
    settings: RateLimitSettings,
    key_fn: KeyFn,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let cache = self.cache.clone();
        let settings = self.settings;
        let key = (self.key_fn)(&req);

        Box::pin(async move {
            let window = Duration::from_secs(settings.window_seconds);
            let (hits, reset) = match cache.hit(&key, window).await {
                Ok(counted) => counted,
                Err(e) => {
                    tracing::warn!(
                        error.message = %e,
                        key = %key,
                        "Rate limiter unavailable, letting the request through"
                    );
                    let response = service.call(req).await?;
                    return Ok(response.map_into_left_body());
                }
            };

            let state = RateLimitState {
                limit: settings.limit,
                window: settings.window_seconds,
                hits,
                reset,
            };

            if state.is_exceeded() {
                let mut response = HttpResponse::TooManyRequests()
                    .json(serde_json::json!({ "message": TOO_MANY_REQUESTS }));
                state.write_headers(response.headers_mut());
                return Ok(req.into_response(response).map_into_right_body());
            }

            match service.call(req).await {
                Ok(mut response) => {
                    state.write_headers(response.headers_mut());
                    Ok(response.map_into_left_body())
                }
                // Rejections from inner middleware count against the quota
                // too, so they advertise it as well.
                Err(e) => {
                    let mut response = e.error_response();
                    state.write_headers(response.headers_mut());
                    Err(InternalError::from_response(e, response).into())
                }
            }
        })
    }
}
