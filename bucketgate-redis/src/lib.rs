//! Redis bucket store for `bucketgate` (companion crate).
//!
//! Each bucket is a plain string key holding a decimal integer. Reads and blind writes are
//! `GET`/`SET`; the conditional write runs as a Lua script so the comparison and the `SET`
//! happen atomically on the server.

use async_trait::async_trait;
use bucketgate::BucketStore;
use redis::aio::ConnectionManager;
use std::sync::Arc;

/// Default address used when `REDIS_ADDR` is unset.
pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";

// KEYS[1] bucket key
// ARGV[1] "1" if the key must hold ARGV[2], "0" if it must be absent
// ARGV[3] value to write
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
  if current ~= ARGV[2] then
    return 0
  end
elseif current then
  return 0
end
redis.call('SET', KEYS[1], ARGV[3])
return 1
"#;

/// Errors from the Redis store.
#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("bucket '{key}' holds non-integer value {value:?}")]
    NotAnInteger { key: String, value: String },
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    pub url: String,
}

impl RedisStoreConfig {
    /// Accepts `host:port` or a full `redis://`, `rediss://` or `unix://` URL.
    pub fn new(addr: impl AsRef<str>) -> Self {
        Self { url: normalize_addr(addr.as_ref()) }
    }

    /// Read `REDIS_ADDR`, falling back to [`DEFAULT_REDIS_ADDR`].
    pub fn from_env() -> Self {
        match std::env::var("REDIS_ADDR") {
            Ok(addr) if !addr.trim().is_empty() => Self::new(addr),
            _ => Self::new(DEFAULT_REDIS_ADDR),
        }
    }
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_ADDR)
    }
}

fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if ["redis://", "rediss://", "unix://", "redis+unix://"].iter().any(|s| addr.starts_with(s)) {
        addr.to_string()
    } else {
        format!("redis://{}", addr)
    }
}

fn parse_tokens(key: &str, raw: Option<String>) -> Result<Option<i64>, RedisStoreError> {
    match raw {
        None => Ok(None),
        // Only canonical decimals: the CAS script compares the raw string.
        Some(value) => match value.parse::<i64>() {
            Ok(tokens) if tokens.to_string() == value => Ok(Some(tokens)),
            _ => Err(RedisStoreError::NotAnInteger { key: key.to_string(), value }),
        },
    }
}

/// [`BucketStore`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisBucketStore {
    conn: ConnectionManager,
    cas: Arc<redis::Script>,
    url: String,
}

impl std::fmt::Debug for RedisBucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBucketStore")
            .field("url", &self.url)
            .field("conn", &"<redis::aio::ConnectionManager>")
            .finish()
    }
}

impl RedisBucketStore {
    /// Open a managed connection and verify it with `PING`.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the server does not answer.
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, RedisStoreError> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(target: "bucketgate::redis", url = %config.url, "connected to redis");
        Ok(Self { conn, cas: Arc::new(redis::Script::new(COMPARE_AND_SET)), url: config.url })
    }

    /// Remove a bucket. Mostly useful for test cleanup.
    pub async fn delete(&self, key: &str) -> Result<(), RedisStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    type Error = RedisStoreError;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        parse_tokens(key, raw)
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET").arg(key).arg(tokens).query_async(&mut conn).await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        let mut conn = self.conn.clone();
        let (must_exist, expected) = match expected {
            Some(v) => ("1", v.to_string()),
            None => ("0", String::new()),
        };
        let applied: i64 = self
            .cas
            .key(key)
            .arg(must_exist)
            .arg(expected)
            .arg(tokens)
            .invoke_async(&mut conn)
            .await?;
        if applied == 0 {
            tracing::trace!(target: "bucketgate::redis", key, "conditional write rejected");
        }
        Ok(applied == 1)
    }
}
