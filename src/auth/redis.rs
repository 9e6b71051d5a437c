//! Redis-backed session store.
//!
//! Keys expire natively through `SET ... EX`.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use super::session::{SessionError, SessionStore};

/// Session store on a Redis server, sharing one auto-reconnecting connection.
pub struct RedisSessionStore {
    manager: ConnectionManager,
}

impl RedisSessionStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let client = Client::open(url).map_err(unavailable)?;
        let manager = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!("Connected to Redis session store");
        Ok(Self { manager })
    }
}

fn unavailable(e: redis::RedisError) -> SessionError {
    SessionError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(unavailable)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
