//! snooze-core: Core abstractions and configuration for snooze
//!
//! This crate provides the domain types shared by the panel client, the
//! decoy listeners and the reconciliation loop, the error taxonomy, the
//! daemon configuration and the `ServerControl` trait that the loop drives.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::SnoozeError;
pub use types::{ListenerState, ManagedServer, ServerId, ServerStats};
