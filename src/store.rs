// Storage collaborators shared by the auth core
//
// `KeyValueStore` is the TTL key/value contract used for verification tokens and
// token revocations. Redis backs it in production; `MemoryStore` backs it in tests
// and when no Redis address is configured.

use axum::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Failures raised by storage collaborators
///
/// Absence is never an error here: lookups return `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command
    #[error("store transport error: {0}")]
    Transport(String),

    /// A uniqueness constraint was violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Transport(err.to_string())
    }
}

/// Key/value store with native per-key expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value, expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically reads and removes `key`. Of several concurrent callers for the
    /// same key at most one observes the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens a managed connection to the Redis server at `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        tracing::debug!("Connecting to Redis");
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Redis connection established");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        // PX rejects 0, so sub-millisecond TTLs round up
        let millis = ttl.as_millis().clamp(1, u64::MAX as u128) as u64;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        // GETDEL (Redis >= 6.2) is a single atomic round trip
        let mut conn = self.conn.clone();
        let value = redis::cmd("GETDEL")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    /// Added to the wall clock so tests can jump past expiry
    skew: Duration,
}

impl MemoryState {
    fn now(&self) -> Instant {
        Instant::now() + self.skew
    }

    /// Drops every expired entry
    fn sweep(&mut self) {
        let now = self.now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Drops `key` if it has expired, returning the live entry otherwise
    fn live(&mut self, key: &str) -> Option<&MemoryEntry> {
        let now = self.now();
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.expires_at <= now)
            .unwrap_or(false);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }
}

/// In-process store; every operation holds one lock, so `take` is atomic per key
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves this store's clock forward by `by`
    pub async fn advance(&self, by: Duration) {
        let mut state = self.state.lock().await;
        state.skew += by;
    }

    /// Number of entries that have not yet expired
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        let now = state.now();
        state
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        // entries nobody reads again would otherwise stay forever
        state.sweep();
        let expires_at = state.now() + ttl;
        state.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.live(key).map(|entry| entry.value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        if state.live(key).is_none() {
            return Ok(None);
        }
        Ok(state.entries.remove(key).map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.entries.remove(key);
        Ok(())
    }
}

/// Store whose every call fails as if the server were down
#[cfg(test)]
pub(crate) struct UnreachableStore;

#[cfg(test)]
#[async_trait]
impl KeyValueStore for UnreachableStore {
    async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn take(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Transport("connection refused".into()))
    }
}
