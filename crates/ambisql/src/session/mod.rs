//! Session store for in-flight conversations.
//!
//! Each session owns one [`Rewriter`] behind its own async mutex, so turns of one
//! conversation are serialized while different sessions proceed in parallel.

pub mod conversation;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::rewriter::Rewriter;

pub use conversation::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

pub type SessionHandle = Arc<Mutex<Rewriter>>;

/// Lifecycle contract for conversations: create on the first turn, reuse on
/// later turns, evict explicitly or after a period of inactivity.
pub trait SessionStore: Send + Sync {
    fn create(&self, rewriter: Rewriter) -> SessionId;

    /// Returns the session and marks it as recently used.
    fn get(&self, id: SessionId) -> Option<SessionHandle>;

    fn evict(&self, id: SessionId) -> bool;

    /// Drops every session idle for longer than the store's TTL as of `now`.
    fn evict_expired(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    last_accessed: Instant,
}

#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: config.ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_accessed) > self.ttl
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, rewriter: Rewriter) -> SessionId {
        let id = SessionId::new();
        let entry = SessionEntry {
            handle: Arc::new(Mutex::new(rewriter)),
            last_accessed: Instant::now(),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entry);
        debug!(session = %id, "session created");
        id
    }

    fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let expired = sessions
            .get(&id)
            .is_some_and(|entry| self.is_expired(entry, now));
        if expired {
            sessions.remove(&id);
            debug!(session = %id, "session expired on access");
            return None;
        }

        let entry = sessions.get_mut(&id)?;
        entry.last_accessed = now;
        Some(Arc::clone(&entry.handle))
    }

    fn evict(&self, id: SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!(session = %id, "session evicted");
        }
        removed
    }

    fn evict_expired(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "expired sessions evicted");
        }
        evicted
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
