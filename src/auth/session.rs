//! Token sessions for filevault.
//!
//! A session maps an opaque token to a user id inside a key-value store
//! with a fixed time-to-live. Reads never extend the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;

/// Session-related errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backing store could not be reached.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Default session duration (24 hours).
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 24 * 60 * 60;

/// Key-value store with per-key expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), SessionError>;

    /// Get the live value for `key`. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Delete `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, SessionError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> bool;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// In-process session store.
///
/// Expired entries are treated as absent, removed when next touched,
/// and swept in the background by [`spawn_sweeper`](Self::spawn_sweeper).
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }

    /// Purge expired entries every `every` until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            timer.tick().await;

            loop {
                timer.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired().await;
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if *expires_at > Instant::now() => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: drop it, unless it was refreshed in the meantime.
        let mut entries = self.entries.write().await;
        if let Some((_, expires_at)) = entries.get(key) {
            if *expires_at <= Instant::now() {
                entries.remove(key);
            }
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionError> {
        let removed = self.entries.write().await.remove(key);
        Ok(matches!(removed, Some((_, expires_at)) if expires_at > Instant::now()))
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Issues, resolves and revokes session tokens on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    key_prefix: String,
}

impl SessionManager {
    /// Create a manager with an explicit TTL and key prefix.
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            ttl,
            key_prefix: key_prefix.into(),
        }
    }

    /// Create a manager from the `[session]` config section.
    pub fn from_config(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self::new(store, config.ttl(), config.key_prefix.clone())
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.key_prefix, token)
    }

    /// Session lifetime applied at issue time.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a new token for `user_id` and store it with the configured TTL.
    pub async fn issue(&self, user_id: i64) -> Result<String, SessionError> {
        let token = Uuid::new_v4().simple().to_string();
        self.store
            .set_with_ttl(&self.key(&token), &user_id.to_string(), self.ttl)
            .await?;
        debug!("Session issued for user {}", user_id);
        Ok(token)
    }

    /// Look up the user behind `token`.
    ///
    /// Unknown and expired tokens both resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<i64>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(value) = self.store.get(&self.key(token)).await? else {
            return Ok(None);
        };

        match value.parse::<i64>() {
            Ok(user_id) => Ok(Some(user_id)),
            Err(_) => {
                warn!("Session value is not a user id; treating as absent");
                Ok(None)
            }
        }
    }

    /// Revoke `token`. Unknown tokens are treated as already revoked.
    pub async fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        if token.is_empty() {
            return Ok(false);
        }
        self.store.delete(&self.key(token)).await
    }

    /// Check that the backing store is reachable.
    pub async fn ping(&self) -> bool {
        self.store.ping().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}
