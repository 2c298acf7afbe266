use crate::domain::UserEmail;
use crate::email_client::EmailClient;
use crate::utils::{log_email_error, EmailError, EmailRecipient, RequestInfo};

use super::users::User;

/// Sends the transactional emails of the auth flows.
///
/// Delivery failures are logged through [`log_email_error`] and never
/// reported to the caller: the request that triggered the email succeeds
/// regardless.
#[derive(Debug, Clone)]
pub struct AuthMailer {
    email_client: EmailClient,
    base_url: String,
    reset_password_url: String,
}

impl AuthMailer {
    pub fn new(email_client: EmailClient, base_url: String, reset_password_url: String) -> Self {
        Self {
            email_client,
            base_url,
            reset_password_url,
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/api/auth/verify-email?token={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    pub fn reset_password_link(&self, token: &str) -> String {
        format!(
            "{}?token={}",
            self.reset_password_url,
            urlencoding::encode(token)
        )
    }

    #[tracing::instrument(name = "Send verification email", skip(self, user, token, request), fields(user_id = %user.id))]
    pub async fn send_verification(&self, user: &User, token: &str, request: Option<&RequestInfo>) {
        let link = self.verification_link(token);
        let html = format!(
            r#"<p>Click the link to verify your email: <a href="{0}">{1}</a></p>"#,
            htmlescape::encode_attribute(&link),
            htmlescape::encode_minimal(&link)
        );
        let text = format!("Click the link to verify your email: {}", link);
        self.deliver("verification", user, "Verify your Email Address.", &html, &text, request)
            .await;
    }

    #[tracing::instrument(name = "Send reset password email", skip(self, user, token, request), fields(user_id = %user.id))]
    pub async fn send_reset_password(&self, user: &User, token: &str, request: Option<&RequestInfo>) {
        let link = self.reset_password_link(token);
        let html = format!(
            r#"<p>Click the link to reset your password: <a href="{0}">{1}</a>. This link expires in 1 hour.</p>"#,
            htmlescape::encode_attribute(&link),
            htmlescape::encode_minimal(&link)
        );
        let text = format!(
            "Click the link to reset your password: {}. This link expires in 1 hour.",
            link
        );
        self.deliver("reset-password", user, "Reset your password", &html, &text, request)
            .await;
    }

    #[tracing::instrument(name = "Send password reset notice", skip(self, user, request), fields(user_id = %user.id))]
    pub async fn send_password_reset_notice(&self, user: &User, request: Option<&RequestInfo>) {
        self.deliver(
            "password-reset",
            user,
            "Password Reset",
            "<p>Your password has been successfully reset.</p>",
            "Your password has been successfully reset.",
            request,
        )
        .await;
    }

    async fn deliver(
        &self,
        kind: &str,
        user: &User,
        subject: &str,
        html: &str,
        text: &str,
        request: Option<&RequestInfo>,
    ) {
        let recipient = EmailRecipient {
            id: user.id.to_string(),
            email: user.email.clone(),
        };
        let outcome = match UserEmail::parse(user.email.clone()) {
            Ok(email) => self.email_client.send_email(&email, subject, html, text).await,
            Err(e) => Err(EmailError {
                name: "validation_error".to_string(),
                message: e,
            }),
        };
        if let Err(e) = outcome {
            log_email_error(kind, &recipient, &e, request);
        }
    }
}
