/// Redis client wrapper with reconnection, timeouts and health checks
///
/// Wraps `redis::aio::ConnectionManager`, which reconnects on its own after a
/// dropped connection. Every command runs under the configured command
/// timeout so a stalled Redis cannot block a worker job.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    pub connection_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Loads the configuration from the environment
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (required)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: Command timeout (default: 5)
    pub fn from_env() -> Result<Self, RedisClientError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            RedisClientError::ConfigError("REDIS_URL environment variable is required".to_string())
        })?;

        Ok(Self::from_url(url).with_timeouts(
            env_secs("REDIS_CONNECTION_TIMEOUT_SECS", 5),
            env_secs("REDIS_COMMAND_TIMEOUT_SECS", 5),
        ))
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 5,
        }
    }

    pub fn with_timeouts(mut self, connection_secs: u64, command_secs: u64) -> Self {
        self.connection_timeout_secs = connection_secs.max(1);
        self.command_timeout_secs = command_secs.max(1);
        self
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Channel the push gateway listens on for one user
pub fn notification_channel(user_id: Uuid) -> String {
    format!("notifications:{}", user_id)
}

/// Redis client, cheap to clone
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid or no connection can be made within the
    /// connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_secs);
        let manager = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisClientError::Timeout(connect_timeout))?
            .map_err(|e| {
                RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, RedisClientError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        let limit = Duration::from_secs(self.config.command_timeout_secs);
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RedisClientError::Timeout(limit))?
            .map_err(RedisClientError::from)
    }

    /// Sends PING; true on PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();
        let pong: String = self.with_timeout(redis::cmd("PING").query_async(&mut conn)).await?;

        if pong == "PONG" {
            Ok(true)
        } else {
            tracing::warn!(response = %pong, "Unexpected PING response");
            Ok(false)
        }
    }

    /// Publishes a message and returns the number of subscribers that got it
    pub async fn publish(&self, channel: &str, message: &str) -> Result<i64, RedisClientError> {
        let mut conn = self.manager.clone();
        self.with_timeout(conn.publish::<_, _, i64>(channel, message)).await
    }

    /// Raw connection for commands not wrapped here
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Masks credentials in a Redis URL for logging
fn sanitize_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at_pos)) if at_pos > scheme_end => {
            format!("{}***@{}", &url[..scheme_end + 3], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}
