use actix_starter_kit::cache::Cache;
use actix_starter_kit::configuration::{
    get_configuration, DatabaseSettings, Environment, Settings,
};
use actix_starter_kit::shutdown::Shutdown;
use actix_starter_kit::startup::{get_connection_pool, Application};
use actix_starter_kit::telemetry::{get_line_subscriber, get_subscriber, init_subscriber};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;
use wiremock::MockServer;

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // The sink is part of the subscriber's type, so each branch initialises its own.
    match std::env::var("TEST_LOG") {
        Ok(v) => {
            if v == "json" {
                init_subscriber(get_subscriber(
                    subscriber_name,
                    default_filter_level,
                    Environment::Local,
                    std::io::stdout,
                ));
            } else {
                init_subscriber(get_line_subscriber(default_filter_level, std::io::stdout));
            }
        }
        _ => {
            init_subscriber(get_subscriber(
                subscriber_name,
                default_filter_level,
                Environment::Local,
                std::io::sink,
            ));
        }
    };
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub email_server: MockServer,
    pub shutdown: Shutdown,
    pub api_client: reqwest::Client,
    pub settings: Settings,
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_sign_up(&self, body: &Value) -> reqwest::Response {
        self.post_json("/api/auth/sign-up/email", body).await
    }

    pub async fn post_sign_in(&self, body: &Value) -> reqwest::Response {
        self.post_json("/api/auth/sign-in/email", body).await
    }

    pub async fn get_me(&self) -> reqwest::Response {
        self.get("/api/v1/me").await
    }

    /// Finds the single link in the plain text part of an email sent
    /// through the mock server.
    ///
    /// `local_link` rewrites the link's port to the spawned app so it can be
    /// followed directly.
    pub fn get_email_link(&self, email_request: &wiremock::Request, local_link: bool) -> reqwest::Url {
        let body: Value = serde_json::from_slice(&email_request.body).unwrap();
        let text = body["text"].as_str().unwrap();

        let links: Vec<_> = linkify::LinkFinder::new()
            .links(text)
            .filter(|l| *l.kind() == linkify::LinkKind::Url)
            .collect();
        assert_eq!(links.len(), 1);
        let mut link = reqwest::Url::parse(links[0].as_str()).unwrap();
        if local_link {
            // make sure host is local
            assert_eq!(link.host_str().unwrap(), "127.0.0.1");
            link.set_port(Some(self.port)).unwrap();
        }
        link
    }
}

fn test_configuration(email_server: &MockServer) -> Settings {
    let mut c = get_configuration().expect("Failed to read configuration.");
    // Use random port
    c.application.port = 0;
    c.application.host = "127.0.0.1".to_string();
    c.database.migrate = false;
    c.email_client.base_url = email_server.uri();
    c.email_client.retries = 0;
    c
}

async fn launch(settings: Settings, email_server: MockServer, connect_cache: bool) -> TestApp {
    let application = Application::build(settings.clone())
        .await
        .expect("Failed to build application.");
    if connect_cache {
        application
            .cache()
            .connect()
            .await
            .expect("Failed to connect to Redis.");
    }
    let port = application.port();
    let shutdown = application.shutdown_handle();
    let _ = tokio::spawn(application.run_until_stopped());

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        email_server,
        shutdown,
        api_client,
        settings,
    }
}

/// Spawns the application without touching Postgres or Redis.
///
/// The pool is lazy and the cache is never connected, so only routes that
/// do not reach the database can be exercised.
pub async fn spawn_app() -> TestApp {
    dotenv().ok();
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;
    let settings = test_configuration(&email_server);
    launch(settings, email_server, false).await
}

/// Spawns the application against a fresh, migrated database and a live
/// Redis connection.
pub async fn spawn_app_with_database() -> TestApp {
    dotenv().ok();
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;
    let mut settings = test_configuration(&email_server);
    // Use a different database for each test
    settings.database.database_name = Uuid::new_v4().to_string();
    configure_database(&settings.database).await;
    launch(settings, email_server, true).await
}

/// Redis database reserved for rate-limit tests, so their counters never
/// collide with other suites sharing the server.
const RATE_LIMIT_REDIS_DB: u8 = 15;

/// Spawns the application with a live Redis connection and a `/api/v1`
/// quota of `limit` requests per minute. The counter for the loopback
/// address starts from zero.
pub async fn spawn_app_with_rate_limit(limit: u64) -> TestApp {
    dotenv().ok();
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;
    let mut settings = test_configuration(&email_server);
    settings.redis_uri = Secret::new(format!(
        "{}/{}",
        settings.redis_uri.expose_secret().trim_end_matches('/'),
        RATE_LIMIT_REDIS_DB
    ));
    settings.rate_limit.limit = limit;
    settings.rate_limit.window_seconds = 60;

    let cache = Cache::new(&settings.redis_uri).expect("Invalid Redis URI.");
    cache.connect().await.expect("Failed to connect to Redis.");
    cache.delete("ratelimit:127.0.0.1").await;
    cache.quit().await;

    launch(settings, email_server, true).await
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.database_name).as_str())
        .await
        .expect("Failed to create database.");

    let connection_pool = get_connection_pool(config);
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database");
    connection_pool
}

pub fn assert_json_message(body: &Value, message: &str) {
    assert_eq!(body["message"], message, "unexpected body: {}", body);
}
