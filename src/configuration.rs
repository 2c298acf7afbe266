//! src/configuration.rs
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};

use crate::domain::UserEmail;
use crate::fetch::RetryPolicy;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    // The URI is marked as secret because it may embed a password.
    pub redis_uri: Secret<String>,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub base_url: String,
    /// Either `*` or a comma separated list of origins.
    pub allowed_origins: String,
    pub service_name: String,
    pub log_level: String,
    pub json_body_limit: usize,
    #[serde(skip, default = "Environment::current")]
    pub environment: Environment,
}

impl ApplicationSettings {
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// `None` means every origin is allowed.
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        parse_origins(&self.allowed_origins)
    }
}

fn parse_origins(raw: &str) -> Option<Vec<String>> {
    if raw.trim() == "*" {
        return None;
    }
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    // Determine if we demand the connection to be encrypted or not
    pub require_ssl: bool,
    pub migrate: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            // Try an encrypted connection, fallback to unencrypted if it fails
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        let mut options = self.without_db().database(&self.database_name);
        options.log_statements(tracing::log::LevelFilter::Trace);
        options
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: Secret<String>,
    pub timeout_milliseconds: u64,
    pub retries: u32,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<UserEmail, String> {
        UserEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            timeout: self.timeout(),
            ..RetryPolicy::default()
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct AuthSettings {
    pub cookie_prefix: String,
    pub min_password_length: usize,
    pub max_password_length: usize,
    /// Session lifetime, in seconds.
    pub session_expires_in: u64,
    /// Age after which a session's expiry is pushed back on use, in seconds.
    pub session_update_age: u64,
    /// Lifetime of verification and reset tokens, in seconds.
    pub verification_expires_in: u64,
    pub rate_limit: RateLimitSettings,
    /// Frontend page the reset-password email links to.
    pub reset_password_url: String,
    #[serde(default)]
    pub trusted_origins: Vec<String>,
}

impl AuthSettings {
    pub fn session_cookie_name(&self) -> String {
        format!("{}.session_token", self.cookie_prefix)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_expires_in)
    }

    pub fn session_refresh_age(&self) -> Duration {
        Duration::from_secs(self.session_update_age)
    }

    pub fn verification_lifetime(&self) -> Duration {
        Duration::from_secs(self.verification_expires_in)
    }
}

#[derive(serde::Deserialize, Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub limit: u64,
    pub window_seconds: u64,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment = Environment::current();
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Add in settings from environment variables (with a prefix of APP and '__' as separator)
        // E.g. `APP_APPLICATION__PORT=5001 would set `Settings.application.port`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    /// Reads `APP_ENVIRONMENT`, defaulting to `local`.
    pub fn current() -> Self {
        std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .expect("Failed to parse APP_ENVIRONMENT")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(a: String) -> Result<Self, Self::Error> {
        match a.to_lowercase().as_str() {
            "local" | "development" | "test" => Ok(Self::Local),
            other if other.starts_with("prod") => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either 'local' or 'production'.",
                other
            )),
        }
    }
}
