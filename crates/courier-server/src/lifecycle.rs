// Start/stop state machine for the broker server and its TCP accept loop.
use crate::config::ServerConfig;
use crate::handler::{ConnectionHandler, DiscardHandler};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

// Default upper bound on graceful shutdown before the accept task is aborted.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Running,
    Stopped,
}

#[derive(thiserror::Error, Debug)]
pub enum StartError {
    #[error("port {port} unavailable: already bound by another process")]
    PortUnavailable { port: u16 },
    #[error("server already started")]
    AlreadyStarted,
    #[error("bind port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum StopError {
    #[error("graceful shutdown exceeded {grace:?}; accept loop terminated forcibly")]
    ForcedTermination { grace: Duration },
}

/// A constructed server instance.
///
/// Created by [`ServerLifecycleManager::construct`]; holds no network
/// resources until started. The owning process drives it through `start` and
/// `stop` sequentially, so a `&mut` borrow is required for both transitions.
pub struct ServerHandle {
    config: ServerConfig,
    state: LifecycleState,
    handler: Arc<dyn ConnectionHandler>,
    running: Option<RunningServer>,
}

struct RunningServer {
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> ServerConfig {
        self.config
    }
}

/// Owns the start/stop transitions of server handles.
///
/// ```no_run
/// use courier_server::{ServerConfig, ServerLifecycleManager};
///
/// # async fn run() -> anyhow::Result<()> {
/// let manager = ServerLifecycleManager::new();
/// let mut handle = manager.construct(ServerConfig::new(9000)?);
/// manager.start(&mut handle).await?;
/// manager.stop(&mut handle).await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerLifecycleManager {
    grace_period: Duration,
}

impl Default for ServerLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLifecycleManager {
    pub fn new() -> Self {
        Self::with_grace_period(DEFAULT_SHUTDOWN_GRACE)
    }

    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Binds configuration to a new handle in state `Unstarted`.
    ///
    /// In-memory only: no socket is touched until `start`.
    pub fn construct(&self, config: ServerConfig) -> ServerHandle {
        self.construct_with_handler(config, Arc::new(DiscardHandler))
    }

    pub fn construct_with_handler(
        &self,
        config: ServerConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> ServerHandle {
        ServerHandle {
            config,
            state: LifecycleState::Unstarted,
            handler,
            running: None,
        }
    }

    /// Binds the listen port and starts accepting connections.
    ///
    /// The listener is live before this returns: a successful `bind` means
    /// the accept backlog is already open, so callers may connect immediately.
    pub async fn start(&self, handle: &mut ServerHandle) -> Result<(), StartError> {
        if handle.state != LifecycleState::Unstarted {
            return Err(StartError::AlreadyStarted);
        }
        let port = handle.config.port();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|err| {
            if err.kind() == io::ErrorKind::AddrInUse {
                StartError::PortUnavailable { port }
            } else {
                StartError::Bind { port, source: err }
            }
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = Arc::clone(&handle.handler);
        let accept_task = tokio::spawn(accept_loop(listener, handler, shutdown_rx));
        handle.running = Some(RunningServer {
            shutdown_tx,
            accept_task,
        });
        handle.state = LifecycleState::Running;
        tracing::info!(port, "tcp listener started");
        Ok(())
    }

    /// Releases the listen port and transitions the handle to `Stopped`.
    ///
    /// Safe on an `Unstarted` handle (no-op transition) and idempotent once
    /// stopped. A running server gets `grace_period` to drain in-flight
    /// connections; past that the accept task is aborted and
    /// `StopError::ForcedTermination` is reported. The handle ends up
    /// `Stopped` in every outcome.
    pub async fn stop(&self, handle: &mut ServerHandle) -> Result<(), StopError> {
        match handle.state {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Unstarted => {
                handle.state = LifecycleState::Stopped;
                return Ok(());
            }
            LifecycleState::Running => {}
        }
        let result = match handle.running.take() {
            Some(running) => shutdown_running(running, self.grace_period).await,
            None => Ok(()),
        };
        handle.state = LifecycleState::Stopped;
        result
    }
}

async fn shutdown_running(running: RunningServer, grace: Duration) -> Result<(), StopError> {
    let RunningServer {
        shutdown_tx,
        mut accept_task,
    } = running;
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(grace, &mut accept_task).await {
        Ok(_) => {
            tracing::info!("tcp listener stopped");
            Ok(())
        }
        Err(_) => {
            // Aborting drops the accept loop, which releases the listener and
            // cancels any connection tasks still on its JoinSet.
            accept_task.abort();
            let _ = accept_task.await;
            tracing::warn!(grace_ms = grace.as_millis() as u64, "forced listener shutdown");
            Err(StopError::ForcedTermination { grace })
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    metrics::counter!("courier_connections_accepted_total").increment(1);
                    connections.spawn(handler.handle(stream, peer));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                }
            },
        }
    }
    // Release the port before draining in-flight connections so a successor
    // can bind it while slow peers finish.
    drop(listener);
    while connections.join_next().await.is_some() {}
}
