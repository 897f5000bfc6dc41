//! Outbound message routing for per-session connections (SSE streams and
//! WebSocket sockets).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use toolwire_mcp::JsonRpcNotification;

/// Capacity of each connection's outbound queue.
pub(crate) const OUTBOUND_BUFFER: usize = 64;

#[derive(Clone, Default)]
pub(crate) struct Hub {
    peers: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
}

impl Hub {
    pub(crate) fn register(&self, session_id: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.lock().insert(session_id.to_string(), tx);
        rx
    }

    pub(crate) fn remove(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    /// Drop every sender so each connection's outbound stream ends.
    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// A sender for one connection, if it is still registered. Callers should
    /// not hold on to it, or the connection's stream will outlive [`clear`](Self::clear).
    pub(crate) fn sender(&self, session_id: &str) -> Option<mpsc::Sender<String>> {
        self.lock().get(session_id).cloned()
    }

    /// Queue a raw message for one connection. False if it is gone or full.
    pub(crate) fn send_raw(&self, session_id: &str, message: String) -> bool {
        let Some(tx) = self.sender(session_id) else {
            return false;
        };
        match tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "dropping outbound message");
                false
            }
        }
    }

    /// Push a notification to one session.
    pub(crate) fn notify(&self, session_id: &str, method: &str, params: Option<Value>) -> bool {
        match encode(method, params) {
            Some(message) => self.send_raw(session_id, message),
            None => false,
        }
    }

    /// Push a notification to every connected session; returns how many accepted it.
    pub(crate) fn broadcast(&self, method: &str, params: Option<Value>) -> usize {
        let Some(message) = encode(method, params) else {
            return 0;
        };
        let peers: Vec<(String, mpsc::Sender<String>)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();
        peers
            .into_iter()
            .filter(|(id, tx)| match tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "broadcast skipped session");
                    false
                }
            })
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<String>>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn encode(method: &str, params: Option<Value>) -> Option<String> {
    serde_json::to_string(&JsonRpcNotification::new(method, params))
        .map_err(|e| tracing::error!(error = %e, "failed to encode notification"))
        .ok()
}
