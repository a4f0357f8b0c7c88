//! One decoy conversation
//!
//! A connection either asks for the server list entry (answered, no wake) or
//! starts logging in (kicked with the wake message, reported as a join).
//! Anything else drops the connection.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;

use snooze_core::ListenerState;
use snooze_protocol::{Clientbound, HandshakeCodec, ProtocolError, Serverbound};

use super::DecoySettings;

/// How a single connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionOutcome {
    /// Server list ping, answered
    Pinged,
    /// Login attempt, client kicked with the wake message
    Joined { player: Option<String> },
    /// Malformed, timed out or closed before saying anything useful
    Dropped,
}

type DecoyFramed = Framed<TcpStream, HandshakeCodec>;

/// Run the conversation with one client
pub(crate) async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    settings: &DecoySettings,
    state_tx: &watch::Sender<ListenerState>,
) -> ConnectionOutcome {
    let mut framed = Framed::new(socket, HandshakeCodec::new());

    let handshake = match read_packet(&mut framed, settings.handshake_timeout).await {
        Ok(Some(Serverbound::Handshake(handshake))) => handshake,
        Ok(Some(packet)) => {
            tracing::debug!("{} sent {:?} before its handshake", peer, packet);
            return ConnectionOutcome::Dropped;
        }
        Ok(None) => return ConnectionOutcome::Dropped,
        Err(e) => {
            tracing::debug!("Dropping {}: {}", peer, e);
            return ConnectionOutcome::Dropped;
        }
    };

    if handshake.next_state.is_join() {
        // Never move a closed listener back
        state_tx.send_if_modified(|state| {
            if *state == ListenerState::Open {
                *state = ListenerState::ConnectionObserved;
                true
            } else {
                false
            }
        });
        let player = read_login_start(&mut framed, settings.handshake_timeout, peer).await;
        kick(&mut framed, &settings.disconnect_message, peer).await;
        ConnectionOutcome::Joined { player }
    } else {
        serve_status(&mut framed, settings, peer).await
    }
}

/// Answer one status request and one ping, in that order
async fn serve_status(
    framed: &mut DecoyFramed,
    settings: &DecoySettings,
    peer: SocketAddr,
) -> ConnectionOutcome {
    let mut answered = false;

    loop {
        let packet = match read_packet(framed, settings.handshake_timeout).await {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Status exchange with {} ended: {}", peer, e);
                break;
            }
        };

        let reply = match packet {
            Serverbound::StatusRequest if !answered => {
                Clientbound::StatusResponse(settings.status.clone())
            }
            Serverbound::Ping { payload } => Clientbound::Pong { payload },
            other => {
                tracing::debug!("Unexpected {:?} from {} in status state", other, peer);
                break;
            }
        };
        let is_pong = matches!(reply, Clientbound::Pong { .. });

        if let Err(e) = framed.send(reply).await {
            tracing::debug!("Failed to answer {}: {}", peer, e);
            break;
        }
        answered = true;

        // Pong is the last packet of a server list ping
        if is_pong {
            break;
        }
    }

    if answered {
        tracing::debug!("Answered server list ping from {}", peer);
        ConnectionOutcome::Pinged
    } else {
        ConnectionOutcome::Dropped
    }
}

/// Best effort: the player name is only used for logging
async fn read_login_start(
    framed: &mut DecoyFramed,
    timeout: Duration,
    peer: SocketAddr,
) -> Option<String> {
    match read_packet(framed, timeout).await {
        Ok(Some(Serverbound::LoginStart { name })) => Some(name),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("No login start from {}: {}", peer, e);
            None
        }
    }
}

async fn kick(framed: &mut DecoyFramed, message: &str, peer: SocketAddr) {
    let disconnect = Clientbound::LoginDisconnect {
        reason: message.to_string(),
    };
    if let Err(e) = framed.send(disconnect).await {
        tracing::debug!("Failed to send disconnect to {}: {}", peer, e);
    }
    if let Err(e) = SinkExt::<Clientbound>::close(framed).await {
        tracing::trace!("Closing connection to {}: {}", peer, e);
    }
}

/// Next packet, bounded by `timeout`
async fn read_packet(
    framed: &mut DecoyFramed,
    timeout: Duration,
) -> Result<Option<Serverbound>, ProtocolError> {
    match tokio::time::timeout(timeout, framed.next()).await {
        Ok(Some(result)) => result.map(Some),
        Ok(None) => Ok(None),
        Err(_) => Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "client did not finish its handshake in time",
        ))),
    }
}
