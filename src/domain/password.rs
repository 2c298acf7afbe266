use secrecy::{ExposeSecret, Secret};

/// A candidate password whose length is within the configured bounds.
#[derive(Debug)]
pub struct Password(Secret<String>);

impl Password {
    pub fn parse(
        candidate: Secret<String>,
        min_length: usize,
        max_length: usize,
    ) -> Result<Password, String> {
        let length = candidate.expose_secret().chars().count();
        if length < min_length {
            Err(format!(
                "Password is too short, it must be at least {} characters long.",
                min_length
            ))
        } else if length > max_length {
            Err(format!(
                "Password is too long, it must be at most {} characters long.",
                max_length
            ))
        } else {
            Ok(Self(candidate))
        }
    }

    pub fn into_secret(self) -> Secret<String> {
        self.0
    }
}
