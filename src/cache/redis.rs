//! Redis cache backend.
//!
//! # Design Decisions
//! - `deadpool-redis` pool with a bounded size; checkout waits at most the connect timeout
//! - Every command runs under the configured socket deadline, independent of the breaker
//! - Batch writes use a MULTI/EXEC pipeline so a batch is applied all-or-nothing

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::{AsyncCommands, InfoDict};

use super::backend::{human_bytes, BackendError, BackendInfo, CacheBackend};
use crate::config::RedisConfig;

/// Pooled Redis client implementing [`CacheBackend`].
pub struct RedisBackend {
    pool: Pool,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("max_size", &self.pool.status().max_size)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl RedisBackend {
    /// Build the pool. No connection is opened until the first command.
    pub fn new(config: &RedisConfig) -> Result<Self, BackendError> {
        let url = config
            .url()
            .map_err(|e| BackendError::Connection(format!("invalid redis url: {}", e)))?;

        let pool = Config::from_url(url.as_str())
            .builder()
            .map(|b| {
                b.max_size(config.max_connections)
                    .wait_timeout(Some(config.connect_timeout()))
                    .create_timeout(Some(config.connect_timeout()))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| BackendError::Connection(e.to_string()))?
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            max_connections = config.max_connections,
            "Redis pool configured"
        );

        Ok(Self {
            pool,
            command_timeout: config.command_timeout(),
        })
    }

    async fn conn(&self) -> Result<Connection, BackendError> {
        self.pool
            .get()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))
    }

    /// Check out a connection and run `command` on it within the socket deadline.
    async fn run<T, F, Fut>(&self, command: F) -> Result<T, BackendError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let work = async {
            let conn = self.conn().await?;
            command(conn).await.map_err(classify)
        };
        tokio::time::timeout(self.command_timeout, work)
            .await
            .map_err(|_| BackendError::Timeout(self.command_timeout))?
    }
}

fn classify(err: redis::RedisError) -> BackendError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        BackendError::Connection(err.to_string())
    } else if err.is_timeout() {
        BackendError::Command(format!("timeout: {}", err))
    } else {
        BackendError::Command(err.to_string())
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let _pong: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.run(|mut conn| async move { conn.get(key).await }).await
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, BackendError> {
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await })
            .await
            .map(|()| true)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.to_vec();
        self.run(|mut conn| async move { conn.del(keys).await }).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        self.run(|mut conn| async move { conn.exists(key).await }).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // Explicit MGET: the typed helper issues GET for a single key and
        // would not return a list.
        let keys = keys.to_vec();
        self.run(|mut conn| async move {
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await
        })
        .await
    }

    async fn set_ex_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<usize, BackendError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let written = entries.len();
        let secs = ttl_secs(ttl);
        let () = self
            .run(|mut conn| async move {
                let mut pipe = redis::pipe();
                pipe.atomic();
                for (key, value) in entries {
                    pipe.set_ex(key, value, secs).ignore();
                }
                pipe.query_async(&mut conn).await
            })
            .await?;
        Ok(written)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        self.run(|mut conn| async move { conn.keys(pattern).await }).await
    }

    async fn info(&self) -> Result<BackendInfo, BackendError> {
        let info: InfoDict = self
            .run(|mut conn| async move { redis::cmd("INFO").query_async(&mut conn).await })
            .await?;

        let used_memory: u64 = info.get("used_memory").unwrap_or_default();
        Ok(BackendInfo {
            connected_clients: info.get("connected_clients").unwrap_or_default(),
            used_memory,
            used_memory_human: info
                .get("used_memory_human")
                .unwrap_or_else(|| human_bytes(used_memory)),
            keyspace_hits: info.get("keyspace_hits").unwrap_or_default(),
            keyspace_misses: info.get("keyspace_misses").unwrap_or_default(),
            total_commands_processed: info.get("total_commands_processed").unwrap_or_default(),
            uptime_in_seconds: info.get("uptime_in_seconds").unwrap_or_default(),
            redis_version: info
                .get("redis_version")
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Permanent: a closed deadpool pool hands out no more connections.
    async fn close(&self) {
        self.pool.close();
        tracing::info!("Redis pool closed");
    }
}
