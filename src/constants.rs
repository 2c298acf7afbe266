use std::time::Duration;

/// Upper bound for the whole graceful-shutdown sequence.
pub const FORCE_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

pub const API_V1: &str = "/api/v1";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub mod messages {
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const NOT_FOUND: &str = "Not Found";
    pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
    pub const TOO_MANY_REQUESTS: &str = "Too Many Requests";
}
