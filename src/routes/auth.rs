//! `/api/auth/*`: email/password sign-up, verification, sessions and
//! password reset.
mod get_session;
mod password_reset;
mod sign_in;
mod sign_out;
mod sign_up;
mod verify_email;

pub use get_session::get_session;
pub use password_reset::{request_password_reset, reset_password};
pub use sign_in::sign_in;
pub use sign_out::sign_out;
pub use sign_up::sign_up;
pub use verify_email::verify_email;

use actix_web::cookie::{time, Cookie, SameSite};

/// Session cookie as set on sign-in. An empty `token` with zero max-age
/// clears it.
fn session_cookie<'a>(name: String, token: String, max_age_secs: i64, secure: bool) -> Cookie<'a> {
    Cookie::build(name, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .finish()
}
