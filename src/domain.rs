mod new_user;
mod password;
mod user_email;
mod user_name;

pub use new_user::NewUser;
pub use password::Password;
pub use user_email::UserEmail;
pub use user_name::UserName;
