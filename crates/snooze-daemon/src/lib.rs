//! snooze-daemon: Sleep idle game servers, wake them on connect
//!
//! The daemon polls the management panel, stops servers that have been empty
//! for too long and puts a decoy listener on the port of every stopped
//! server. The decoy looks like the real server in the multiplayer list;
//! when someone tries to join, it kicks them with a "starting up" message,
//! releases the port and the daemon asks the panel to start the server.

pub mod decoy;
pub mod panel;
pub mod reconcile;
pub mod registry;
pub mod state;

pub use decoy::{DecoyListener, DecoySettings, WakeSignal};
pub use panel::PanelClient;
pub use reconcile::{Reconciler, TickReport};
pub use registry::WakeRegistry;
pub use state::DaemonState;
