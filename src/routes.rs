pub mod auth;
mod error;
mod health_check;
mod me;

pub use error::{json_error_handler, not_found, ApiError};
pub use health_check::*;
pub use me::*;
