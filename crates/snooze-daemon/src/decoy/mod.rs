//! Decoy listeners
//!
//! A decoy holds the port of a stopped server. It answers server list pings
//! so the server still shows up in the multiplayer list, and turns the first
//! login attempt into a [`WakeSignal`] for the reconciliation loop.

mod handler;
mod listener;

use std::time::Duration;

use snooze_core::config::DaemonConfig;
use snooze_core::ServerId;
use snooze_protocol::StatusResponse;

pub use listener::DecoyListener;

/// Emitted once by a decoy that saw a login attempt
///
/// By the time it is received the decoy has already released its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeSignal {
    pub server_id: ServerId,
    pub server_name: String,
    pub port: u16,
    /// Name from the client's Login Start, if it got that far
    pub player: Option<String>,
}

/// What every decoy advertises, shared between listeners
#[derive(Debug, Clone)]
pub struct DecoySettings {
    /// Host to bind on
    pub bind_host: String,
    /// Status JSON answered to pings
    pub status: StatusResponse,
    /// Kick message for the waking client
    pub disconnect_message: String,
    /// Budget for reading each packet of a conversation
    pub handshake_timeout: Duration,
}

impl DecoySettings {
    pub fn from_config(config: &DaemonConfig) -> Self {
        let decoy = &config.decoy;
        Self {
            bind_host: config.bind_host.clone(),
            status: StatusResponse::new(
                decoy.motd.clone(),
                decoy.version_name.clone(),
                decoy.protocol_version,
                decoy.max_players,
            ),
            disconnect_message: decoy.disconnect_message.clone(),
            handshake_timeout: decoy.handshake_timeout,
        }
    }
}
