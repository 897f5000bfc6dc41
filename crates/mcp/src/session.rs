//! Session tracking for stateful transports.
//!
//! SSE streams and WebSocket connections each get a session. Sessions are
//! touched on every access and removed either explicitly (disconnect) or by
//! the periodic sweep once they have been idle longer than the timeout.
//! There is no capacity bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Sweep cadence and idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionManagerConfig {
    pub cleanup_interval: Duration,
    pub session_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5 * 60),
            session_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// A snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

struct Entry {
    session: Session,
    // Monotonic clock used for expiry so paused-time tests can drive it.
    touched: Instant,
}

impl Entry {
    fn touch(&mut self) {
        self.touched = Instant::now();
        self.session.last_accessed_at = Utc::now();
    }
}

pub struct SessionManager {
    config: SessionManagerConfig,
    sessions: RwLock<HashMap<String, Entry>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SessionManagerConfig {
        self.config
    }

    /// Create a session with a fresh v4 UUID.
    pub async fn create_session(&self, metadata: Option<Map<String, Value>>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_accessed_at: now,
            metadata: metadata.unwrap_or_default(),
        };
        self.sessions.write().await.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                touched: Instant::now(),
            },
        );
        tracing::debug!(session_id = %session.id, "session created");
        session
    }

    /// Look up a session, refreshing its last-access time.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.touch();
        Some(entry.session.clone())
    }

    /// Shallow-merge `metadata` into the session and touch it.
    pub async fn update_session(&self, id: &str, metadata: Map<String, Value>) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.session.metadata.extend(metadata);
        entry.touch();
        Some(entry.session.clone())
    }

    pub async fn delete_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "session deleted");
        }
        removed
    }

    pub async fn all_sessions(&self) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .values()
            .map(|e| e.session.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove every session idle for strictly longer than the timeout.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let timeout = self.config.session_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.touched) <= timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "expired sessions swept");
        }
        removed
    }

    /// Spawn the periodic sweeper. Calling this while it runs is a no-op.
    ///
    /// The task only holds a weak reference, so dropping the last
    /// `Arc<SessionManager>` ends it.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.cleanup_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.sweep_expired().await;
            }
        }));
        tracing::debug!(interval_secs = period.as_secs(), "session sweeper started");
    }

    /// Cancel the sweeper. Sessions are kept.
    pub fn stop(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("session sweeper stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionManagerConfig::default())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}
