//! Decoy listener task and handle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use snooze_core::error::ListenerError;
use snooze_core::{ListenerState, ManagedServer, ServerId};

use super::handler::{handle_connection, ConnectionOutcome};
use super::{DecoySettings, WakeSignal};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Handle to a running decoy listener
///
/// Dropping the handle cancels the listener and frees the port.
#[derive(Debug)]
pub struct DecoyListener {
    /// Server this decoy stands in for
    server: ManagedServer,
    /// Address actually bound
    local_addr: SocketAddr,
    /// Published by the listener task
    state: watch::Receiver<ListenerState>,
    /// Child of the process token
    cancel: CancellationToken,
}

impl DecoyListener {
    /// Bind the server's port and start answering on it
    pub async fn open(
        server: ManagedServer,
        settings: Arc<DecoySettings>,
        wake_tx: mpsc::Sender<WakeSignal>,
        parent: &CancellationToken,
    ) -> Result<Self, ListenerError> {
        let port = server.server_port;
        let bind_addr = tokio::net::lookup_host((settings.bind_host.as_str(), port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ListenerError::InvalidAddress(settings.bind_host.clone()))?;

        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ListenerError::PortBind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::PortBind { port, source })?;

        let cancel = parent.child_token();
        let (state_tx, state_rx) = watch::channel(ListenerState::Open);
        let state_tx = Arc::new(state_tx);

        tracing::debug!(
            "Decoy for {} ({}) bound to {}",
            server.server_name,
            server.server_id,
            local_addr
        );

        let task = ListenerTask {
            server: server.clone(),
            port: local_addr.port(),
            settings,
            state_tx,
            wake_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(listener));

        Ok(Self {
            server,
            local_addr,
            state: state_rx,
            cancel,
        })
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server.server_id
    }

    /// Port actually bound (differs from `server_port` only when that is 0)
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Whether the listener has finished and released its port
    pub fn is_closed(&self) -> bool {
        self.state() == ListenerState::Closed
    }

    /// Stop listening. Idempotent; the port is released once the task
    /// observes the cancellation, see [`wait_closed`](Self::wait_closed).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the listener task has released its port
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        // Err means the task is gone, which also means the port is free
        let _ = state.wait_for(|s| *s == ListenerState::Closed).await;
    }
}

impl Drop for DecoyListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the spawned accept loop
struct ListenerTask {
    server: ManagedServer,
    port: u16,
    settings: Arc<DecoySettings>,
    /// Shared with the connection tasks
    state_tx: Arc<watch::Sender<ListenerState>>,
    wake_tx: mpsc::Sender<WakeSignal>,
    cancel: CancellationToken,
}

impl ListenerTask {
    async fn run(self, listener: TcpListener) {
        // Connection tasks outlive neither the listener nor the first join
        let connections = self.cancel.child_token();
        let joined = self.accept_until_join(&listener, &connections).await;
        connections.cancel();

        // Unbind before anyone hears about the wake, so the real server can
        // take the port as soon as it is started
        drop(listener);
        self.state_tx.send_replace(ListenerState::Closed);

        let player = match joined {
            Some(player) => player,
            None => {
                tracing::debug!(
                    "Decoy for {} closed on port {}",
                    self.server.server_name,
                    self.port
                );
                return;
            }
        };

        tracing::info!(
            "Wake requested for {} on port {} by {}",
            self.server.server_name,
            self.port,
            player.as_deref().unwrap_or("unknown player")
        );

        let signal = WakeSignal {
            server_id: self.server.server_id.clone(),
            server_name: self.server.server_name.clone(),
            port: self.port,
            player,
        };
        if self.wake_tx.send(signal).await.is_err() {
            tracing::warn!(
                "Wake for {} dropped, reconciliation loop is gone",
                self.server.server_name
            );
        }
    }

    /// Accept until a connection task reports a join. Returns the player
    /// name of that join, or `None` if cancelled first.
    async fn accept_until_join(
        &self,
        listener: &TcpListener,
        connections: &CancellationToken,
    ) -> Option<Option<String>> {
        let (joined_tx, mut joined_rx) = mpsc::channel::<Option<String>>(1);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,

                Some(player) = joined_rx.recv() => return Some(player),

                result = listener.accept() => match result {
                    Ok((socket, peer)) => {
                        tracing::debug!("Decoy on port {} accepted {}", self.port, peer);
                        self.spawn_connection(
                            socket,
                            peer,
                            connections.clone(),
                            joined_tx.clone(),
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Decoy on port {} failed to accept: {}", self.port, e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Handle one client on its own task
    fn spawn_connection(
        &self,
        socket: TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
        joined_tx: mpsc::Sender<Option<String>>,
    ) {
        let settings = Arc::clone(&self.settings);
        let state_tx = Arc::clone(&self.state_tx);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::trace!("Connection from {} cancelled", peer);
                    return;
                }
                outcome = handle_connection(socket, peer, &settings, &state_tx) => outcome,
            };

            if let ConnectionOutcome::Joined { player } = outcome {
                // Only the first join is read; later ones find the loop gone
                let _ = joined_tx.send(player).await;
            }
        });
    }
}
