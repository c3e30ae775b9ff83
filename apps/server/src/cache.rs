//! Response cache.
//!
//! Key → JSON value with a TTL, behind the [`Cache`] trait so handlers do
//! not care where entries live.
//!
//! ```text
//! ┌──────────────┐       ┌──────────────────────────────────┐
//! │   handler    │──────►│  Arc<dyn Cache>                  │
//! └──────────────┘       │  ├── MemoryCache  (DashMap)      │
//!                        │  └── RedisCache   (REDIS_URL set)│
//!                        └──────────────────────────────────┘
//! ```
//!
//! Cache failures never fail a request: a Redis error is logged and treated
//! as a miss.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::warn;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Removes every key starting with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str);
}

/// Dashboard entries of one store, one key per day.
pub fn dashboard_key(tenant_id: &str, date: chrono::NaiveDate) -> String {
    format!("{}{}", dashboard_prefix(tenant_id), date)
}

pub fn dashboard_prefix(tenant_id: &str) -> String {
    format!("dashboard:{}:", tenant_id)
}

// =============================================================================
// In-memory
// =============================================================================

/// Expired entries are dropped on read and swept on every write, so keys of
/// stores that stop selling do not pile up.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Value, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `key` only if it is still expired at removal time.
    fn evict_if_expired(&self, key: &str) {
        self.entries
            .remove_if(key, |_, (_, expires_at)| *expires_at <= Instant::now());
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        {
            let entry = self.entries.get(key)?;
            if entry.1 > Instant::now() {
                return Some(entry.0.clone());
            }
        }

        // the read guard must be gone before removing
        self.evict_if_expired(key);
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        self.entries.insert(key.to_string(), (value, now + ttl));
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }
}

// =============================================================================
// Redis
// =============================================================================

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisCache { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(raw) => raw.and_then(|s| serde_json::from_str(&s).ok()),
            Err(e) => {
                warn!(error = %e, key = %key, "Redis GET failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut conn = self.conn.clone();
        let result = conn
            .set_ex::<_, _, ()>(key, value.to_string(), ttl.as_secs().max(1))
            .await;
        if let Err(e) = result {
            warn!(error = %e, key = %key, "Redis SET failed");
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut conn = self.conn.clone();
        let keys = match redis::cmd("KEYS")
            .arg(format!("{}*", prefix))
            .query_async::<Vec<String>>(&mut conn)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, prefix = %prefix, "Redis KEYS failed");
                return;
            }
        };

        if keys.is_empty() {
            return;
        }
        if let Err(e) = conn.del::<_, ()>(keys).await {
            warn!(error = %e, prefix = %prefix, "Redis DEL failed");
        }
    }
}
