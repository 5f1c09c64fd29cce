//! Session event store.
//!
//! The relay persists every published event so a peer that joins late can
//! replay what it missed.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use veil_common::{Result, SessionEvent};

use crate::config::DEFAULT_MAX_SESSIONS;

/// Durable per-session event log.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Append an event to the session's log.
    async fn append(&self, session_id: &str, event: SessionEvent) -> Result<()>;

    /// Every retained event of the session, oldest first.
    async fn backlog(&self, session_id: &str) -> Result<Vec<SessionEvent>>;
}

struct SessionLog {
    events: VecDeque<SessionEvent>,
    last_append: u64,
}

#[derive(Default)]
struct Sessions {
    logs: HashMap<String, SessionLog>,
    clock: u64,
}

/// In-memory store keeping the most recent `limit` events per session.
///
/// At most `max_sessions` sessions are retained; appending to a new session
/// beyond that drops the session appended to least recently.
pub struct MemoryStore {
    sessions: RwLock<Sessions>,
    limit: usize,
    max_sessions: usize,
}

impl MemoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            limit: limit.max(1),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.logs.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn append(&self, session_id: &str, event: SessionEvent) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let sessions = &mut *guard;
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.logs.contains_key(session_id) && sessions.logs.len() >= self.max_sessions {
            let idle = sessions
                .logs
                .iter()
                .min_by_key(|(_, log)| log.last_append)
                .map(|(id, _)| id.clone());
            if let Some(idle) = idle {
                sessions.logs.remove(&idle);
                debug!("evicted idle session {}", idle);
            }
        }

        let log = sessions
            .logs
            .entry(session_id.to_string())
            .or_insert_with(|| SessionLog {
                events: VecDeque::new(),
                last_append: now,
            });
        if log.events.len() >= self.limit {
            log.events.pop_front();
        }
        log.events.push_back(event);
        log.last_append = now;
        Ok(())
    }

    async fn backlog(&self, session_id: &str) -> Result<Vec<SessionEvent>> {
        let guard = self.sessions.read().await;
        Ok(guard
            .logs
            .get(session_id)
            .map(|log| log.events.iter().cloned().collect())
            .unwrap_or_default())
    }
}
