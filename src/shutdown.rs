//! Graceful shutdown: stop the HTTP server, then release Postgres and Redis.

use std::future::Future;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use sqlx::PgPool;

use crate::cache::Cache;
use crate::constants::FORCE_EXIT_TIMEOUT;

/// Everything that must be released before the process exits.
#[derive(Clone)]
pub struct Shutdown {
    server: ServerHandle,
    pool: PgPool,
    cache: Cache,
    timeout: Duration,
}

impl Shutdown {
    pub fn new(server: ServerHandle, pool: PgPool, cache: Cache) -> Self {
        Self {
            server,
            pool,
            cache,
            timeout: FORCE_EXIT_TIMEOUT,
        }
    }

    /// Overrides the force-exit deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the shutdown sequence and returns the process exit code: `0` if
    /// every step finished in time, `1` if the deadline was hit.
    pub async fn run(self, signal: &str) -> i32 {
        tracing::info!(signal, "Received Signal: {}, shutting down", signal);

        match tokio::time::timeout(self.timeout, self.release()).await {
            Ok(()) => {
                tracing::info!("Graceful shutdown complete, exiting process.");
                0
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Forcefully exiting due to timeout"
                );
                1
            }
        }
    }

    async fn release(&self) {
        // In-flight requests are allowed to finish.
        self.server.stop(true).await;
        tracing::info!("HTTP server closed");

        tracing::info!("Closing Postgres connection");
        self.pool.close().await;
        tracing::info!("Postgres connection closed");

        tracing::info!("Closing Redis connection");
        self.cache.quit().await;
    }
}

/// Resolves with the name of the first termination signal received.
pub async fn termination_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "SIGINT")
    }
}

/// Resolves with the received signal's name. When the handlers cannot be
/// installed the failure is logged and this never resolves, so the server
/// keeps running instead of shutting down on startup.
pub async fn wait_for_termination<F>(signal: F) -> &'static str
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    match signal.await {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to listen for termination signals"
            );
            std::future::pending().await
        }
    }
}
