//! Admin session storage.
//!
//! Two backends satisfy [`SessionStore`]: an in-process map swept on an
//! interval, and Redis with native key expiry. The Redis store degrades to
//! an embedded in-process map whenever a command fails.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::Mutex;

use crate::models::session::Session;

/// How long startup waits for Redis before falling back to memory.
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The contract every session backend satisfies.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `token`, expiring one TTL from now.
    async fn put(&self, token: &str);

    /// Whether `token` is live. A successful lookup slides its expiry forward.
    async fn exists(&self, token: &str) -> bool;

    /// Forgets `token`.
    async fn delete(&self, token: &str);

    /// Drops expired entries and returns how many were removed.
    async fn sweep_expired(&self) -> usize {
        0
    }

    /// Whether expiry is handled by an external service.
    fn is_external(&self) -> bool;
}

/// Sessions kept in a process-local map.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500)),
        }
    }

    /// Number of entries currently held, live or not.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token: &str) {
        let session = Session::new(token.to_string(), self.ttl);
        self.sessions.lock().await.insert(token.to_string(), session);
    }

    async fn exists(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(token) {
            if session.is_live(now) {
                session.refresh(now, self.ttl);
                return true;
            }
            sessions.remove(token);
        }
        false
    }

    async fn delete(&self, token: &str) {
        self.sessions.lock().await.remove(token);
    }

    async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_live(now));
        before - sessions.len()
    }

    fn is_external(&self) -> bool {
        false
    }
}

/// Sessions kept in Redis as `session:{token}` keys with a native TTL.
pub struct RedisSessionStore {
    redis: ConnectionManager,
    ttl_secs: u64,
    fallback: MemorySessionStore,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager, ttl: Duration) -> Self {
        Self {
            redis,
            ttl_secs: ttl.as_secs().max(1),
            fallback: MemorySessionStore::new(ttl),
        }
    }

    fn key(token: &str) -> String {
        format!("session:{}", token)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token: &str) {
        let mut conn = self.redis.clone();
        let result: redis::RedisResult<()> = conn.set_ex(Self::key(token), "1", self.ttl_secs).await;
        if let Err(e) = result {
            tracing::error!("❌ Redis session put failed, using in-memory fallback: {}", e);
            self.fallback.put(token).await;
        }
    }

    async fn exists(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let mut conn = self.redis.clone();
        // EXPIRE answers 1 only for an existing key, refreshing it in the same round trip.
        let result: redis::RedisResult<bool> = conn.expire(Self::key(token), self.ttl_secs as i64).await;
        match result {
            Ok(true) => true,
            Ok(false) => self.fallback.exists(token).await,
            Err(e) => {
                tracing::error!("❌ Redis session lookup failed, using in-memory fallback: {}", e);
                self.fallback.exists(token).await
            }
        }
    }

    async fn delete(&self, token: &str) {
        let mut conn = self.redis.clone();
        let result: redis::RedisResult<()> = conn.del(Self::key(token)).await;
        if let Err(e) = result {
            tracing::error!("❌ Redis session delete failed: {}", e);
        }
        self.fallback.delete(token).await;
    }

    /// Redis expires its own keys; only the degraded-mode map needs sweeping.
    async fn sweep_expired(&self) -> usize {
        self.fallback.sweep_expired().await
    }

    fn is_external(&self) -> bool {
        true
    }
}

/// Builds the session store for this process.
///
/// Uses Redis when a URL is configured and reachable, otherwise the
/// in-process map.
pub async fn connect(redis_url: Option<&str>, ttl: Duration) -> Arc<dyn SessionStore> {
    let Some(url) = redis_url else {
        tracing::info!("✅ Using in-memory session store");
        return Arc::new(MemorySessionStore::new(ttl));
    };

    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("❌ Invalid REDIS_URL, falling back to in-memory sessions: {}", e);
            return Arc::new(MemorySessionStore::new(ttl));
        }
    };

    match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, ConnectionManager::new(client)).await {
        Ok(Ok(manager)) => {
            tracing::info!("✅ Connected to Redis for session store");
            Arc::new(RedisSessionStore::new(manager, ttl))
        }
        Ok(Err(e)) => {
            tracing::error!("❌ Redis connection failed, falling back to in-memory sessions: {}", e);
            Arc::new(MemorySessionStore::new(ttl))
        }
        Err(_) => {
            tracing::error!("❌ Redis connection timed out, falling back to in-memory sessions");
            Arc::new(MemorySessionStore::new(ttl))
        }
    }
}

/// Runs `sweep_expired` on `store` every `interval`, forever.
///
/// External stores are swept too, for the in-process entries they keep while
/// the service behind them is failing.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    let scope = if store.is_external() { "fallback " } else { "" };

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = store.sweep_expired().await;
            tracing::info!("🧹 Session sweep removed {} expired {}sessions", removed, scope);
        }
    })
}
