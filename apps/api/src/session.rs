//! Conversation state persistence between turns, plus per-session turn locks.
//!
//! A session's state belongs to one turn at a time. The HTTP layer takes the
//! session's lock for the whole load → run → save cycle; without it the
//! whole-value replace rule would silently resolve races as last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::conversation::ConversationState;
use crate::errors::AppError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: Uuid) -> Result<Option<ConversationState>, AppError>;

    async fn save(&self, state: &ConversationState) -> Result<(), AppError>;

    /// Returns whether a session existed.
    async fn delete(&self, session_id: Uuid) -> Result<bool, AppError>;
}

fn session_key(session_id: Uuid) -> String {
    format!("assistant:session:{session_id}")
}

/// Stores each state as a JSON string with a sliding TTL.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<ConversationState>, AppError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(session_id))
            .query_async(&mut con)
            .await?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                AppError::Session(format!("corrupt state for session {session_id}: {e}"))
            })
        })
        .transpose()
    }

    async fn save(&self, state: &ConversationState) -> Result<(), AppError> {
        let payload = serde_json::to_string(state)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize state: {e}")))?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(session_key(state.session_id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut con)
            .await?;
        debug!("Saved session {}", state.session_id);
        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, AppError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(session_key(session_id))
            .query_async(&mut con)
            .await?;
        Ok(removed > 0)
    }
}

/// Process-local store used when no Redis URL is configured, and in tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, ConversationState>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<ConversationState>, AppError> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(state.session_id, state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(&session_id).is_some())
    }
}

type LockMap = HashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per session id. An entry lives only while some turn holds
/// or waits for it, so unknown and expired sessions leave nothing behind.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<StdMutex<LockMap>>,
}

impl SessionLocks {
    /// Waits until no other turn holds `session_id`.
    pub async fn acquire(&self, session_id: Uuid) -> SessionGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(session_id).or_default().clone()
        };
        SessionGuard {
            session_id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or_default()
    }
}

/// Held for the duration of a turn. Dropping it releases the session and
/// prunes the entry when no other turn is waiting on it.
pub struct SessionGuard {
    session_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<StdMutex<LockMap>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own reference to the mutex
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}
