//! Per-client MCP session state (§3 "MCP Session", §4.8 lifecycle state
//! machine) and the session table shared by the streamable transports.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch, RwLock};
use uuid::Uuid;

/// Capacity of a session's SSE event queue (spec §4.9): bounded,
/// drop-newest backpressure.
pub const EVENT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Ready,
    Closed,
}

pub struct Session {
    pub id: String,
    state: RwLock<SessionState>,
    protocol_version: RwLock<Option<String>>,
    last_seen: RwLock<Instant>,
    events: mpsc::Sender<String>,
    close_tx: watch::Sender<bool>,
}

impl Session {
    fn new() -> (Arc<Self>, mpsc::Receiver<String>, watch::Receiver<bool>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (close_tx, close_rx) = watch::channel(false);
        let session = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            state: RwLock::new(SessionState::Active),
            protocol_version: RwLock::new(None),
            last_seen: RwLock::new(Instant::now()),
            events: events_tx,
            close_tx,
        });
        (session, events_rx, close_rx)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.protocol_version.read().await.clone()
    }

    pub async fn set_protocol_version(&self, version: impl Into<String>) {
        *self.protocol_version.write().await = Some(version.into());
    }

    pub async fn mark_ready(&self) {
        *self.state.write().await = SessionState::Ready;
    }

    pub async fn touch(&self) {
        *self.last_seen.write().await = Instant::now();
    }

    /// Enqueues an SSE `message` event body. Drop-newest: a full queue
    /// silently discards the event rather than blocking the writer.
    pub fn enqueue_event(&self, body: String) {
        if self.events.try_send(body).is_err() {
            tracing::warn!(session = %self.id, "SSE event queue full, dropping event");
        }
    }

    pub async fn close(&self) {
        *self.state.write().await = SessionState::Closed;
        let _ = self.close_tx.send(true);
    }
}

/// Shared table of live sessions, keyed by session id.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (Arc<Session>, mpsc::Receiver<String>, watch::Receiver<bool>) {
        let (session, events_rx, close_rx) = Session::new();
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        (session, events_rx, close_rx)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(session) = &removed {
            session.close().await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions() {
        let manager = SessionManager::new();
        let (session, _events, _close) = manager.create().await;
        assert_eq!(session.state().await, SessionState::Active);
        session.mark_ready().await;
        assert_eq!(session.state().await, SessionState::Ready);
        manager.remove(&session.id).await;
        assert_eq!(session.state().await, SessionState::Closed);
        assert!(manager.get(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn full_queue_drops_newest_instead_of_blocking() {
        let manager = SessionManager::new();
        let (session, _events, _close) = manager.create().await;
        for i in 0..EVENT_QUEUE_CAPACITY + 10 {
            session.enqueue_event(format!("event-{i}"));
        }
    }
}
