use std::future::Future;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::signal::{AbortSignal, AnySignal};

/// Field names tried, in order, for a failure message in an error body.
const ERROR_MESSAGE_FIELDS: [&str; 4] = ["Message", "message", "Error", "error"];

/// Everything about an outbound request except its URL.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Caller-owned cancellation. Firing it stops the call and any
    /// further retries.
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Message carried by an error body, or "Unknown error" when none of the
    /// usual fields hold a truthy value. Fails only if the body is not JSON.
    pub fn error_message(&self) -> Result<String, serde_json::Error> {
        let body: serde_json::Value = self.json()?;
        let message = ERROR_MESSAGE_FIELDS
            .iter()
            .filter_map(|field| body.get(field))
            .find_map(truthy_text)
            .unwrap_or_else(|| "Unknown error".to_string());
        Ok(message)
    }
}

fn truthy_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The signal handed to the transport fired before the call settled.
    #[error("This operation was aborted")]
    Aborted,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// The network primitive behind [`fetch_and_retry`](super::fetch_and_retry).
///
/// Implementations must resolve with [`TransportError::Aborted`] once
/// `signal` fires, including when it has already fired on entry.
pub trait Transport {
    fn call(
        &self,
        url: &str,
        options: &RequestOptions,
        signal: AnySignal,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http_client: Client,
}

impl HttpTransport {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

impl Transport for HttpTransport {
    async fn call(
        &self,
        url: &str,
        options: &RequestOptions,
        signal: AnySignal,
    ) -> Result<TransportResponse, TransportError> {
        if signal.is_aborted() {
            return Err(TransportError::Aborted);
        }

        let mut builder = self
            .http_client
            .request(options.method.clone(), url)
            .headers(options.headers.clone());
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        // The body is read inside the race so a stalled download is
        // cancelled just like a stalled connect.
        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(TransportResponse::new(status, body.to_vec()))
        };

        tokio::select! {
            biased;
            _ = signal.aborted() => Err(TransportError::Aborted),
            settled = exchange => settled.map_err(TransportError::from),
        }
    }
}
