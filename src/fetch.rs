//! Outbound HTTP with a per-attempt timeout, caller cancellation and
//! bounded retry.
mod outcome;
mod signal;
mod transport;

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

pub use outcome::{ErrorInfo, FetchOutcome};
pub use signal::{AbortController, AbortSignal, AbortSource, AnySignal};
pub use transport::{
    HttpTransport, RequestOptions, Transport, TransportError, TransportResponse,
};

const TOO_MANY_REQUESTS: &str = "Too many requests";
const REQUEST_ABORTED: &str = "Request was aborted";
const REQUEST_TIMED_OUT: &str = "Request took too long";
const FAILED_TO_FETCH: &str = "Failed to fetch data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Pause between two attempts.
    pub sleep: Duration,
    /// Budget for a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Builds a policy from second values. Negative or NaN values collapse
    /// to zero, oversized ones saturate.
    pub fn from_secs(retries: u32, sleep_secs: f64, timeout_secs: f64) -> Self {
        Self {
            retries,
            sleep: secs_to_duration(sleep_secs),
            timeout: secs_to_duration(timeout_secs),
        }
    }
}

/// Negative and NaN values mean "no wait"; values too large for a
/// `Duration` saturate to `Duration::MAX`.
fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            sleep: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Calls `url` through `transport` up to `policy.retries + 1` times.
///
/// - A 2xx response is parsed as `T` and returned straight away.
/// - A 429 stops immediately, whatever attempts remain.
/// - Firing the caller's signal (`options.signal`) stops immediately.
/// - Timeouts, error responses and transport failures are retried after
///   `policy.sleep`; there is no pause after the last attempt.
///
/// Never fails: every error ends up in [`FetchOutcome::Failure`].
pub async fn fetch_and_retry<T, C>(
    transport: &C,
    url: &str,
    options: &RequestOptions,
    policy: &RetryPolicy,
) -> FetchOutcome<T>
where
    T: DeserializeOwned,
    C: Transport,
{
    let mut is_rate_limited = false;
    let mut last_error: Option<String> = None;
    let mut last_status: Option<StatusCode> = None;

    for attempt in 0..=policy.retries {
        let controller = AbortController::new();
        let signal = AnySignal::new(options.signal.clone(), controller.signal());

        let settled = {
            let call = transport.call(url, options, signal.clone());
            tokio::pin!(call);
            let timer = tokio::time::sleep(policy.timeout);
            tokio::pin!(timer);

            tokio::select! {
                biased;
                settled = &mut call => settled,
                _ = &mut timer => {
                    controller.abort();
                    call.await
                }
            }
            // `timer` is dropped here: a settled attempt never fires its
            // own signal afterwards.
        };

        let cause = match settled {
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                is_rate_limited = true;
                break;
            }
            Ok(response) if response.ok() => match response.json::<T>() {
                Ok(data) => {
                    return FetchOutcome::Success {
                        data,
                        status: response.status(),
                    }
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    e.to_string()
                }
            },
            Ok(response) => {
                last_status = Some(response.status());
                let message = response.error_message().unwrap_or_else(|e| e.to_string());
                last_error = Some(message.clone());
                message
            }
            Err(TransportError::Aborted) if signal.caller_aborted() => {
                last_error = Some(REQUEST_ABORTED.to_string());
                last_status = Some(StatusCode::REQUEST_TIMEOUT);
                break;
            }
            Err(e @ TransportError::Aborted) if signal.timer_aborted() => {
                last_error = Some(REQUEST_TIMED_OUT.to_string());
                last_status = Some(StatusCode::REQUEST_TIMEOUT);
                e.to_string()
            }
            Err(e) => {
                last_error = Some(e.to_string());
                e.to_string()
            }
        };

        tracing::warn!(
            attempt = attempt + 1,
            url,
            error = %cause,
            "Attempt {} to fetch {} failed",
            attempt + 1,
            url
        );

        if attempt < policy.retries {
            tokio::time::sleep(policy.sleep).await;
        }
    }

    if is_rate_limited {
        return FetchOutcome::failure(TOO_MANY_REQUESTS, StatusCode::TOO_MANY_REQUESTS);
    }

    FetchOutcome::failure(
        last_error.unwrap_or_else(|| FAILED_TO_FETCH.to_string()),
        last_status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    )
}
