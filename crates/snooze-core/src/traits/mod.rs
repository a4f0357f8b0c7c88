//! Core trait definitions

mod control;

pub use control::ServerControl;
