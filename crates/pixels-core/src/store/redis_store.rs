use super::CanvasStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info};

/// Redis-backed canvas store (for production)
///
/// The canvas lives under a single string key and is patched in place with
/// `SETRANGE`. Enable Redis AUTH in production.
pub struct RedisCanvasStore {
    conn: MultiplexedConnection,
    key: String,
}

impl RedisCanvasStore {
    /// Connect to Redis and verify the server answers `PING`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the server is unreachable
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::store(format!("invalid Redis URL: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::store(format!("Redis connection failed: {}", e)))?;

        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::store(format!("Redis PING failed: {}", e)))?;

        info!(key = %key, "Connected to Redis canvas store");
        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }

    /// Key holding the canvas
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl CanvasStore for RedisCanvasStore {
    async fn get(&self) -> Result<Vec<u8>> {
        let mut conn = self.conn.clone();

        let data: Option<Vec<u8>> = redis::cmd("GET")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::store(format!("Redis GET failed: {}", e)))?;

        Ok(data.unwrap_or_default())
    }

    async fn set_range(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();

        redis::cmd("SETRANGE")
            .arg(&self.key)
            .arg(offset)
            .arg(bytes)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::store(format!("Redis SETRANGE failed: {}", e)))?;

        Ok(())
    }

    async fn initialize(&self, len: usize) -> Result<bool> {
        let mut conn = self.conn.clone();

        let created: bool = redis::cmd("SETNX")
            .arg(&self.key)
            .arg(vec![b'0'; len])
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::store(format!("Redis SETNX failed: {}", e)))?;

        debug!(key = %self.key, created, "Canvas initialization checked");
        Ok(created)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
// Redis tests require a running Redis instance
// Run with: cargo test --features redis-tests
#[cfg(feature = "redis-tests")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redis_canvas_store() {
        let store = RedisCanvasStore::connect("redis://127.0.0.1:6379", "pixels:test")
            .await
            .unwrap();

        let mut conn = store.conn.clone();
        redis::cmd("DEL")
            .arg(store.key())
            .query_async::<()>(&mut conn)
            .await
            .unwrap();

        assert!(store.get().await.unwrap().is_empty());
        assert!(store.initialize(8).await.unwrap());
        assert!(!store.initialize(8).await.unwrap());

        store.set_range(3, b"5").await.unwrap();
        assert_eq!(store.get().await.unwrap(), b"00050000".to_vec());
    }
}
