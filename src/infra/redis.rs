//! Redis-backed implementation of the cache backend.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::application::cache::{CacheBackend, CacheError};

/// Shared multiplexed Redis connection. `ConnectionManager` reconnects on
/// its own; a clone per call hands out a handle to the same connection.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.manager
            .clone()
            .get(key)
            .await
            .map_err(CacheError::backend)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let _: () = self
            .manager
            .clone()
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();
        let mut cursor = 0u64;
        let mut removed = 0u64;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(CacheError::backend)?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(CacheError::backend)?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.manager.clone())
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }
}
