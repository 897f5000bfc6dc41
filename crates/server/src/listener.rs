//! Background axum listener shared by the network transports.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use toolwire_mcp::McpError;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A cloneable handle to at most one running listener.
#[derive(Clone, Default)]
pub(crate) struct Listener {
    running: Arc<Mutex<Option<Running>>>,
}

impl Listener {
    /// Bind `host:port` and serve `router` in the background.
    pub(crate) async fn start(&self, host: &str, port: u16, router: Router) -> Result<SocketAddr, McpError> {
        if self.is_running() {
            return Err(McpError::Transport("listener already running".into()));
        }

        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "listener failed");
            }
        });

        let mut slot = self.running.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Running { addr, shutdown, task });
        Ok(addr)
    }

    /// Stop accepting connections and wait for in-flight requests, up to a
    /// short grace period.
    pub(crate) async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(Running { addr, shutdown, mut task }) = running else {
            return;
        };
        let _ = shutdown.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            tracing::warn!(%addr, "listener did not drain in time, aborting");
            task.abort();
        }
        tracing::info!(%addr, "listener stopped");
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|r| r.addr)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}
