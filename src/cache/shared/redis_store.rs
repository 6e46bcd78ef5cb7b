//! Redis-backed shared tier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, InfoDict};

use super::{ServerInfo, SharedStore};
use crate::error::Result;

// == Redis Store ==
/// Shared tier over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    /// Disambiguates window members added within the same millisecond
    sequence: Arc<AtomicU64>,
}

impl RedisStore {
    /// Connects and verifies the server with PING.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_manager().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            conn,
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.del(keys).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn record_in_window(&self, key: &str, now_ms: u64, window_secs: u64) -> Result<u64> {
        let window_secs = window_secs.max(1);
        // May be negative while the clock is younger than one window
        let window_start = now_ms as i64 - (window_secs * 1000) as i64;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let member = format!("{}-{}", now_ms, seq);

        let mut conn = self.conn.clone();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(key, "-inf", window_start)
            .ignore()
            .zcard(key)
            .zadd(key, member, now_ms)
            .ignore()
            .expire(key, window_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        let mut conn = self.conn.clone();
        let info: InfoDict = redis::cmd("INFO").query_async(&mut conn).await?;

        Ok(ServerInfo {
            used_memory: info
                .get::<String>("used_memory_human")
                .unwrap_or_else(|| "N/A".to_string()),
            connected_clients: info.get("connected_clients").unwrap_or(0),
            total_commands_processed: info.get("total_commands_processed").unwrap_or(0),
        })
    }
}
