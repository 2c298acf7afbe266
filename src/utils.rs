/// Who an email was addressed to.
#[derive(Debug, Clone)]
pub struct EmailRecipient {
    pub id: String,
    pub email: String,
}

/// Error reported by the email provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct EmailError {
    pub name: String,
    pub message: String,
}

/// The inbound request that triggered an email, if there was one.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
}

impl From<&actix_web::HttpRequest> for RequestInfo {
    fn from(request: &actix_web::HttpRequest) -> Self {
        Self {
            method: request.method().to_string(),
            url: request.uri().to_string(),
        }
    }
}

/// Emits a single error event describing a failed email delivery.
pub fn log_email_error(
    kind: &str,
    user: &EmailRecipient,
    error: &EmailError,
    request: Option<&RequestInfo>,
) {
    tracing::error!(
        email.kind = kind,
        http.url = request.map(|r| r.url.as_str()),
        http.method = request.map(|r| r.method.as_str()),
        error.name = %error.name,
        user_id = %user.id,
        user.email = %user.email,
        error.message = %error.message,
        "Failed to send {} email",
        kind
    );
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
