//! Reconciliation loop
//!
//! Every `check_interval` the loop lists the panel's servers and brings the
//! local decoys in line with what it sees:
//!
//! - a running server that has been empty for `inactive_minutes` is stopped,
//!   and gets a decoy in the same tick
//! - a stopped server without a decoy gets one
//! - a server with a decoy that is running again (started from somewhere
//!   else) loses its decoy
//!
//! Wake signals from the decoys are handled on the same task, so the
//! registry only ever changes here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use snooze_core::error::ListenerError;
use snooze_core::{ManagedServer, ServerId, ServerStats};

use crate::decoy::{DecoyListener, WakeSignal};
use crate::state::DaemonState;

/// Wake signals buffered between the decoys and the loop
const WAKE_CHANNEL_CAPACITY: usize = 64;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Listing the servers failed, nothing else happened
    pub aborted: bool,
    /// Servers returned by the panel
    pub listed: usize,
    /// Servers whose stats could not be fetched
    pub failed: usize,
    /// Stop commands accepted by the panel
    pub stopped: usize,
    /// Decoys opened
    pub listening: usize,
    /// Decoys closed because their server is running again
    pub superseded: usize,
    /// Decoys closed because the panel no longer lists their server
    pub vanished: usize,
    /// Decoys that could not bind their port
    pub bind_failures: usize,
}

/// Per-server decision for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Keep,
    Supersede,
    /// Idle past the threshold, carrying how long it has been empty
    Stop { idle_minutes: i64 },
    Listen,
}

/// Decide what to do with one server.
///
/// `stop_pending` means a stop was already issued for the run the panel is
/// still reporting.
fn plan(
    stats: &ServerStats,
    registered: bool,
    stop_pending: bool,
    now: DateTime<FixedOffset>,
    inactive_minutes: u64,
) -> Action {
    // A start in flight needs the port as much as a running server does
    let active = stats.running || stats.waiting_start;

    if registered {
        return if active && !stop_pending {
            Action::Supersede
        } else {
            Action::Keep
        };
    }

    if !active || stop_pending {
        return Action::Listen;
    }

    match stats.idle_minutes(now) {
        Some(idle_minutes) if stats.is_idle_expired(now, inactive_minutes) => {
            Action::Stop { idle_minutes }
        }
        _ => Action::Keep,
    }
}

/// Drives servers between running, stopped and listening
pub struct Reconciler {
    state: Arc<DaemonState>,
    /// Handed to every decoy this loop opens
    wake_tx: mpsc::Sender<WakeSignal>,
    /// Run (by `started`) each server was last stopped for
    stop_ledger: HashMap<ServerId, DateTime<FixedOffset>>,
    cancel: CancellationToken,
}

impl Reconciler {
    /// Create the loop and the receiving end of its wake channel
    pub fn new(
        state: Arc<DaemonState>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<WakeSignal>) {
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
        let reconciler = Self {
            state,
            wake_tx,
            stop_ledger: HashMap::new(),
            cancel,
        };
        (reconciler, wake_rx)
    }

    /// Run until cancelled, then close every decoy
    pub async fn run(mut self, mut wake_rx: mpsc::Receiver<WakeSignal>) {
        let mut interval = tokio::time::interval(self.state.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Starting reconciliation loop (check interval: {:?}, inactive after: {} min)",
            self.state.config.check_interval,
            self.state.config.inactive_minutes
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Reconciliation loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    tracing::debug!("Tick finished: {:?}", report);
                }
                Some(signal) = wake_rx.recv() => {
                    self.handle_wake(signal).await;
                }
            }
        }

        self.state.registry.close_all().await;
    }

    /// Run one tick against the current time
    pub async fn tick(&mut self) -> TickReport {
        let now = snooze_core::time::now_in(self.state.offset);
        self.tick_at(now).await
    }

    /// Run one tick as if it were `now`
    pub async fn tick_at(&mut self, now: DateTime<FixedOffset>) -> TickReport {
        let mut report = TickReport::default();
        tracing::info!("Checking servers");

        let servers = match self.state.control.list_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!("Failed to list servers, skipping this check: {}", e);
                report.aborted = true;
                return report;
            }
        };
        report.listed = servers.len();

        self.forget_unlisted(&servers, &mut report);

        for server in servers {
            let stats = match self.state.control.fetch_stats(&server.server_id).await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch stats for {} ({}): {}",
                        server.server_name,
                        server.server_id,
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };
            self.reconcile_server(server, &stats, now, &mut report).await;
        }

        report
    }

    /// React to a decoy that saw a login attempt
    pub async fn handle_wake(&mut self, signal: WakeSignal) {
        tracing::info!(
            "Connection found for {} on port {}, waking it up",
            signal.server_name,
            signal.port
        );

        // Only drop a finished decoy; a newer one may have been registered
        // since the signal was sent
        if !self.state.registry.unregister_closed(&signal.server_id) {
            tracing::debug!("No finished decoy registered for {}", signal.server_id);
        }
        self.stop_ledger.remove(&signal.server_id);

        match self.state.control.start_server(&signal.server_id).await {
            Ok(()) => tracing::info!("Start issued for {}", signal.server_name),
            Err(e) => tracing::warn!(
                "Failed to start {} ({}), will listen again next check: {}",
                signal.server_name,
                signal.server_id,
                e
            ),
        }
    }

    async fn reconcile_server(
        &mut self,
        server: ManagedServer,
        stats: &ServerStats,
        now: DateTime<FixedOffset>,
        report: &mut TickReport,
    ) {
        let server_id = server.server_id.clone();
        self.refresh_ledger(&server_id, stats);

        let action = plan(
            stats,
            self.state.registry.has(&server_id),
            self.stop_pending(&server_id, stats),
            now,
            self.state.config.inactive_minutes,
        );

        match action {
            Action::Keep => {}
            Action::Supersede => {
                if self.state.registry.unregister(&server_id).is_some() {
                    tracing::info!(
                        "Server {} is running again, closing its decoy",
                        server.server_name
                    );
                    report.superseded += 1;
                }
            }
            Action::Stop { idle_minutes } => {
                tracing::info!(
                    "No players on {} for {} minutes, stopping it",
                    server.server_name,
                    idle_minutes
                );
                match self.state.control.stop_server(&server_id).await {
                    Ok(()) => {
                        if let Some(started) = stats.started {
                            self.stop_ledger.insert(server_id, started);
                        }
                        report.stopped += 1;
                        self.listen(server, report).await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to stop {}: {}", server.server_name, e);
                    }
                }
            }
            Action::Listen => self.listen(server, report).await,
        }
    }

    async fn listen(&self, server: ManagedServer, report: &mut TickReport) {
        let name = server.server_name.clone();
        let port = server.server_port;

        let listener = DecoyListener::open(
            server,
            Arc::clone(&self.state.decoy),
            self.wake_tx.clone(),
            &self.cancel,
        )
        .await;

        match listener {
            Ok(listener) => match self.state.registry.register(listener) {
                Ok(_) => {
                    tracing::info!(
                        "Server {} is not running, listening for connections on port {}",
                        name,
                        port
                    );
                    report.listening += 1;
                }
                Err(e) => tracing::error!("Refusing second decoy for {}: {}", name, e),
            },
            Err(e @ ListenerError::PortBind { .. }) => {
                tracing::warn!("{} for {}, will retry next check", e, name);
                report.bind_failures += 1;
            }
            Err(e) => {
                tracing::warn!("Cannot open decoy for {}: {}", name, e);
                report.bind_failures += 1;
            }
        }
    }

    /// Close decoys of servers the panel no longer lists
    fn forget_unlisted(&mut self, servers: &[ManagedServer], report: &mut TickReport) {
        let listed: HashSet<&ServerId> = servers.iter().map(|s| &s.server_id).collect();

        for server_id in self.state.registry.server_ids() {
            if !listed.contains(&server_id) && self.state.registry.unregister(&server_id).is_some()
            {
                tracing::info!("Server {} is gone from the panel, closing its decoy", server_id);
                report.vanished += 1;
            }
        }
        self.stop_ledger.retain(|id, _| listed.contains(id));
    }

    /// Drop the ledger entry once the stopped run is over
    fn refresh_ledger(&mut self, server_id: &ServerId, stats: &ServerStats) {
        let finished = match self.stop_ledger.get(server_id) {
            Some(stopped_run) => !stats.running || stats.started != Some(*stopped_run),
            None => false,
        };
        if finished {
            self.stop_ledger.remove(server_id);
        }
    }

    fn stop_pending(&self, server_id: &ServerId, stats: &ServerStats) -> bool {
        stats.running
            && stats.started.is_some()
            && self.stop_ledger.get(server_id).copied() == stats.started
    }
}
