//! Email/password authentication.
mod emails;
mod middleware;
mod password;
mod session;
mod token;
mod users;
mod verification;

pub use emails::AuthMailer;
pub use middleware::{is_authorized, session_token, AuthenticatedUser};
pub use password::{compute_password_hash, validate_credentials, AuthError, Credentials};
pub use session::{Session, SessionStore, SessionWithUser};
pub use token::{generate_token, hash_token};
pub use users::{
    get_user_by_email, get_user_by_id, insert_user, mark_email_verified, update_password_hash,
    User,
};
pub use verification::{consume_verification, create_verification, VerificationKind};
