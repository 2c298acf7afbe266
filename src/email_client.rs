use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, Secret};

use crate::domain::UserEmail;
use crate::fetch::{fetch_and_retry, FetchOutcome, HttpTransport, RequestOptions, RetryPolicy};
use crate::utils::EmailError;

const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// Client for the Resend `/emails` API.
#[derive(Debug, Clone)]
pub struct EmailClient {
    transport: HttpTransport,
    base_url: String,
    sender: UserEmail,
    authorization_token: Secret<String>,
    retry_policy: RetryPolicy,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: UserEmail,
        authorization_token: Secret<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            transport: HttpTransport::default(),
            base_url,
            sender,
            authorization_token,
            retry_policy,
        }
    }

    #[tracing::instrument(
        name = "Sending an email",
        skip(self, html_content, text_content),
        fields(recipient = %recipient)
    )]
    pub async fn send_email(
        &self,
        recipient: &UserEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));
        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: vec![recipient.as_ref()],
            subject,
            html: html_content,
            text: text_content,
        };
        let options = self.request_options(&request_body)?;

        // The same key is sent on every retry so Resend delivers at most once.
        match fetch_and_retry::<serde_json::Value, _>(
            &self.transport,
            &url,
            &options,
            &self.retry_policy,
        )
        .await
        {
            FetchOutcome::Success { .. } => Ok(()),
            FetchOutcome::Failure { error, status } => Err(EmailError {
                name: error_name(status).to_string(),
                message: error.message,
            }),
        }
    }

    fn request_options(&self, body: &SendEmailRequest<'_>) -> Result<RequestOptions, EmailError> {
        let authorization =
            HeaderValue::from_str(&format!("Bearer {}", self.authorization_token.expose_secret()))
                .map_err(|e| application_error(e.to_string()))?;
        let idempotency_key = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
            .map_err(|e| application_error(e.to_string()))?;

        RequestOptions::new()
            .method(Method::POST)
            .header(AUTHORIZATION, authorization)
            .header(HeaderName::from_static(IDEMPOTENCY_KEY), idempotency_key)
            .json(body)
            .map_err(|e| application_error(e.to_string()))
    }
}

fn error_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::TOO_MANY_REQUESTS => "rate_limit_exceeded",
        StatusCode::REQUEST_TIMEOUT => "request_timeout",
        _ => "application_error",
    }
}

fn application_error(message: String) -> EmailError {
    EmailError {
        name: "application_error".to_string(),
        message,
    }
}

#[derive(serde::Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}
