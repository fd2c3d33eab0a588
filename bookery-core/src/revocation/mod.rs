//! Revoked session tokens
//!
//! A token listed here is rejected even when its signature and expiry are
//! valid. Entries are keyed by the exact token string and kept until their
//! retention deadline passes.

use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Redis key prefixes
mod keys {
    pub const REVOKED: &str = "bookery:revoked";
}

/// Redis expiry bounds
mod ttl {
    /// `SET EX` rejects zero
    pub const MIN_SECS: u64 = 1;
}

/// Server-side scripts, each runs atomically
mod scripts {
    /// Set KEYS[1] to expire in ARGV[1] seconds unless it already lives longer.
    /// Returns 1 when written.
    pub const EXTEND_ONLY: &str = r#"
local remaining = redis.call('TTL', KEYS[1])
if remaining >= tonumber(ARGV[1]) then
    return 0
end
redis.call('SET', KEYS[1], 1, 'EX', ARGV[1])
return 1
"#;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke for the configured retention horizon
    async fn revoke(&self, token: &str) -> Result<()>;
    /// Revoke and remember the token at least until `retain_until`
    async fn revoke_until(&self, token: &str, retain_until: DateTime<Utc>) -> Result<()>;
    async fn is_revoked(&self, token: &str) -> Result<bool>;
    /// Drop entries past their deadline, returning how many were removed
    async fn prune(&self) -> Result<usize>;
    /// Backend reachability, used by the readiness check
    async fn ping(&self) -> Result<()>;
    fn backend(&self) -> &'static str;
}

/// Process-local store. Only correct when a single instance serves all traffic.
#[derive(Clone)]
pub struct InMemoryRevocationStore {
    entries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    retention: Duration,
}

impl InMemoryRevocationStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token: &str) -> Result<()> {
        self.revoke_until(token, Utc::now() + self.retention).await
    }

    async fn revoke_until(&self, token: &str, retain_until: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let deadline = entries.entry(token.to_string()).or_insert(retain_until);
        // A second logout never shortens the deadline
        if retain_until > *deadline {
            *deadline = retain_until;
        }
        counter!("bookery_revocations_total", "backend" => "memory").increment(1);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(token)
            .is_some_and(|deadline| *deadline > Utc::now()))
    }

    async fn prune(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, deadline| *deadline > now);
        Ok(before - entries.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Shared store on Redis expiring keys. Tokens are stored as SHA-256 digests.
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
    retention: Duration,
    extend_only: Script,
}

impl RedisRevocationStore {
    pub async fn new(config: &RedisConfig, retention: Duration) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create Redis client: {}", e))
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            conn,
            retention,
            extend_only: Script::new(scripts::EXTEND_ONLY),
        })
    }
}

fn revoked_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}:{}", keys::REVOKED, hex::encode(digest))
}

fn expiry_secs(retain_until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let secs = (retain_until - now).num_seconds();
    u64::try_from(secs).unwrap_or(0).max(ttl::MIN_SECS)
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token: &str) -> Result<()> {
        self.revoke_until(token, Utc::now() + self.retention).await
    }

    async fn revoke_until(&self, token: &str, retain_until: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = revoked_key(token);
        let secs = expiry_secs(retain_until, Utc::now());

        let written: i64 = self
            .extend_only
            .key(&key)
            .arg(secs)
            .invoke_async(&mut conn)
            .await?;
        if written == 1 {
            counter!("bookery_revocations_total", "backend" => "redis").increment(1);
        }
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(revoked_key(token)).await?;
        Ok(exists)
    }

    async fn prune(&self) -> Result<usize> {
        // Redis expires keys itself
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Run `prune` on a fixed interval in a background task.
pub fn spawn_pruner(
    store: Arc<dyn RevocationStore>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.prune().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(removed, backend = store.backend(), "Pruned revoked tokens");
                    counter!("bookery_revocations_pruned_total").increment(removed as u64);
                }
                Err(e) => tracing::warn!(error = %e, "Revocation prune failed"),
            }
        }
    })
}
