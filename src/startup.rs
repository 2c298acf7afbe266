use std::net::TcpListener;

use actix_web::dev::{Server, ServiceRequest};
use actix_web::middleware::Condition;
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use actix_web_lab::middleware::from_fn;
use anyhow::Context;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use tracing_actix_web::TracingLogger;

use crate::authentication::{is_authorized, AuthMailer, SessionStore};
use crate::cache::Cache;
use crate::configuration::{DatabaseSettings, Settings};
use crate::constants::API_V1;
use crate::email_client::EmailClient;
use crate::middleware::{
    client_ip, cors, error_handlers, security_headers, tag_request, RateLimit,
    RequestIdRootSpanBuilder,
};
use crate::routes::{auth, health_check, json_error_handler, me, not_found};
use crate::shutdown::Shutdown;

pub struct Application {
    port: u16,
    server: Server,
    cache: Cache,
    shutdown: Shutdown,
}

impl Application {
    /// Builds the server without connecting to Redis; call
    /// `cache().connect()` before serving traffic.
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);

        migrate(&configuration, &connection_pool)
            .await
            .context("Failed to migrate the database")?;

        let cache = Cache::new(&configuration.redis_uri).context("Invalid Redis URI")?;

        let sender_email = configuration
            .email_client
            .sender()
            .map_err(anyhow::Error::msg)
            .context("Invalid sender email address")?;
        let email_client = EmailClient::new(
            configuration.email_client.base_url.clone(),
            sender_email,
            configuration.email_client.authorization_token.clone(),
            configuration.email_client.retry_policy(),
        );

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)
            .with_context(|| format!("Failed to bind {}", address))?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            connection_pool.clone(),
            cache.clone(),
            email_client,
            configuration,
        )?;
        let shutdown = Shutdown::new(server.handle(), connection_pool, cache.clone());

        Ok(Self {
            port,
            server,
            cache,
            shutdown,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    // A more expressive name that makes it clear that
    // this function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

async fn migrate(
    configuration: &Settings,
    connection_pool: &Pool<Postgres>,
) -> Result<(), MigrateError> {
    if configuration.database.migrate {
        tracing::info!("migrating postgres");
        sqlx::migrate!("./migrations").run(connection_pool).await
    } else {
        Ok(())
    }
}

fn auth_rate_limit_key(req: &ServiceRequest) -> String {
    format!("ratelimit:auth:{}", client_ip(req))
}

pub fn run(
    listener: TcpListener,
    connection_pool: PgPool,
    cache: Cache,
    email_client: EmailClient,
    configuration: Settings,
) -> Result<Server, std::io::Error> {
    let Settings {
        application,
        auth: auth_settings,
        rate_limit,
        ..
    } = configuration;

    let session_store = Data::new(SessionStore::new(
        connection_pool.clone(),
        cache.clone(),
        auth_settings.session_lifetime(),
        auth_settings.session_refresh_age(),
    ));
    let mailer = Data::new(AuthMailer::new(
        email_client,
        application.base_url.clone(),
        auth_settings.reset_password_url.clone(),
    ));
    let connection_pool = Data::new(connection_pool);
    let auth_rate_limit = auth_settings.rate_limit;
    let auth_settings = Data::new(auth_settings);
    let is_production = application.is_production();
    let json_body_limit = application.json_body_limit;
    let application = Data::new(application);

    let server = HttpServer::new(move || {
        App::new()
            // Last registered runs first.
            .wrap(error_handlers())
            .wrap(cors(&application))
            .wrap(TracingLogger::<RequestIdRootSpanBuilder>::new())
            .wrap(from_fn(tag_request))
            .wrap(security_headers())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .wrap(Condition::new(
                        is_production,
                        RateLimit::new(cache.clone(), auth_rate_limit).key_fn(auth_rate_limit_key),
                    ))
                    .route("/sign-up/email", web::post().to(auth::sign_up))
                    .route("/verify-email", web::get().to(auth::verify_email))
                    .route("/sign-in/email", web::post().to(auth::sign_in))
                    .route("/sign-out", web::post().to(auth::sign_out))
                    .route("/get-session", web::get().to(auth::get_session))
                    .route(
                        "/request-password-reset",
                        web::post().to(auth::request_password_reset),
                    )
                    .route("/reset-password", web::post().to(auth::reset_password)),
            )
            .service(
                web::scope(API_V1)
                    .app_data(
                        web::JsonConfig::default()
                            .limit(json_body_limit)
                            .error_handler(json_error_handler),
                    )
                    .wrap(from_fn(is_authorized))
                    .wrap(RateLimit::new(cache.clone(), rate_limit))
                    .route("/me", web::get().to(me)),
            )
            .default_service(web::route().to(not_found))
            .app_data(connection_pool.clone())
            .app_data(session_store.clone())
            .app_data(mailer.clone())
            .app_data(auth_settings.clone())
            .app_data(application.clone())
    })
    .disable_signals()
    .listen(listener)?
    .run();
    // No .await here
    Ok(server)
}
