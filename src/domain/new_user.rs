use crate::domain::{Password, UserEmail, UserName};

#[derive(Debug)]
pub struct NewUser {
    pub email: UserEmail,
    pub name: UserName,
    pub password: Password,
}
