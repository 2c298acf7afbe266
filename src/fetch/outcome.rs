use reqwest::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of [`fetch_and_retry`](super::fetch_and_retry).
///
/// Both variants carry the HTTP status: the response status on success,
/// the last recorded (or synthetic) status on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success { data: T, status: StatusCode },
    Failure { error: ErrorInfo, status: StatusCode },
}

impl<T> FetchOutcome<T> {
    pub fn status(&self) -> StatusCode {
        match self {
            FetchOutcome::Success { status, .. } | FetchOutcome::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchOutcome::Success { data, .. } => Some(data),
            FetchOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub(crate) fn failure(message: impl Into<String>, status: StatusCode) -> Self {
        FetchOutcome::Failure {
            error: ErrorInfo::new(message),
            status,
        }
    }
}
