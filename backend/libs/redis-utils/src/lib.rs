use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            Client::open(redis_url).context("failed to parse REDIS_URL connection string")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;
        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Distributed TTL-based mutual exclusion and idempotency guard.
///
/// A single primitive backs two usages: short-lived per-key locks (acquire,
/// do work, release) and "first caller wins" idempotency markers (acquire
/// and let the key expire on its own). Both rely on `SET key NX EX ttl`:
/// exactly one caller observes `true` per key per TTL window.
pub struct TtlGuard {
    manager: SharedConnectionManager,
}

impl TtlGuard {
    pub fn new(manager: SharedConnectionManager) -> Self {
        Self { manager }
    }

    /// Try to claim `key` for `ttl`. Returns `true` when this caller won the
    /// claim, `false` when another holder already owns it.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.manager.lock().await;
        let response: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("redis SET NX EX failed for key {key}"))?;

        let won = response.is_some();
        debug!(key, won, "ttl guard acquire");
        Ok(won)
    }

    /// Release `key` early. Callers using the guard purely as an idempotency
    /// marker never call this and let the TTL expire instead.
    pub async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("redis DEL failed for key {key}"))?;
        debug!(key, "ttl guard release");
        Ok(())
    }
}

/// Fixed-window request counter.
///
/// Each hit increments the key; the first hit of a window sets its expiry.
/// Callers compare the returned count against their limit.
pub struct RateCounter {
    manager: SharedConnectionManager,
}

impl RateCounter {
    pub fn new(manager: SharedConnectionManager) -> Self {
        Self { manager }
    }

    /// Record one hit against `key` and return the count inside the current
    /// window.
    pub async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut conn = self.manager.lock().await;
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("redis INCR failed for key {key}"))?;

        if count == 1 {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window.as_secs().max(1))
                .query_async(&mut *conn)
                .await
                .with_context(|| format!("redis EXPIRE failed for key {key}"))?;
        }

        debug!(key, count, "rate counter hit");
        Ok(count)
    }
}
