//! Redis side-store shared by sessions and rate limiting.
//!
//! Reads and writes never surface errors to callers: a cache that is down
//! behaves like an empty cache, and the failure is logged.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use secrecy::{ExposeSecret, Secret};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("The cache is not connected")]
    NotConnected,
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

#[derive(Clone)]
pub struct Cache {
    client: Client,
    connection: Arc<RwLock<Option<ConnectionManager>>>,
}

// The client embeds the URI, credentials included, so it stays out of
// the output.
impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self
            .connection
            .try_read()
            .map(|connection| connection.is_some())
            .ok();
        f.debug_struct("Cache")
            .field("connected", &connected)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Parses `uri` without opening a connection.
    pub fn new(uri: &Secret<String>) -> Result<Self, CacheError> {
        Ok(Self {
            client: Client::open(uri.expose_secret().as_str())?,
            connection: Arc::new(RwLock::new(None)),
        })
    }

    #[tracing::instrument(name = "Connecting to redis", skip(self))]
    pub async fn connect(&self) -> Result<(), CacheError> {
        let manager = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| {
                tracing::error!(error.message = %e, "Redis connection error: {}", e);
                e
            })?;
        *self.connection.write().await = Some(manager);
        tracing::info!("Redis connection ready");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Drops the live connection. Later calls see an empty cache.
    pub async fn quit(&self) {
        if self.connection.write().await.take().is_some() {
            tracing::info!("Redis connection closed");
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::NotConnected)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let result: Result<Option<String>, CacheError> = async {
            let mut connection = self.connection().await?;
            Ok(connection.get(key).await?)
        }
        .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error.message = %e, "Failed to get key: {} from cache", key);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let result: Result<(), CacheError> = async {
            let mut connection = self.connection().await?;
            let _: () = match ttl {
                Some(ttl) => {
                    connection
                        .set_ex(key, value, ttl.as_secs().max(1) as usize)
                        .await?
                }
                None => connection.set(key, value).await?,
            };
            Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!(error.message = %e, "Failed to set key: {} in cache", key);
        }
    }

    pub async fn delete(&self, key: &str) {
        let result: Result<(), CacheError> = async {
            let mut connection = self.connection().await?;
            let _: () = connection.del(key).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!(error.message = %e, "Failed to delete key: {} from cache", key);
        }
    }

    /// Counts a hit in the fixed window stored under `key`.
    ///
    /// Returns the number of hits so far in the window and how many seconds
    /// remain before it resets. The window starts on the first hit.
    pub async fn hit(&self, key: &str, window: Duration) -> Result<(u64, u64), CacheError> {
        let mut connection = self.connection().await?;
        let window_secs = window.as_secs().max(1);

        let count: u64 = connection.incr(key, 1u64).await?;
        if count == 1 {
            let _: () = connection.expire(key, window_secs as usize).await?;
        }
        let ttl: i64 = connection.ttl(key).await?;
        // A missing expiry (-1) can only come from a crash between INCR and
        // EXPIRE; set it again rather than keep the key forever.
        if ttl < 0 {
            let _: () = connection.expire(key, window_secs as usize).await?;
            return Ok((count, window_secs));
        }

        Ok((count, ttl as u64))
    }
}
