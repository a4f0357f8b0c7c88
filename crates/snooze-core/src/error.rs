//! Core error types for snooze

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ServerId;

/// Top-level error type for the snooze daemon
#[derive(Error, Debug)]
pub enum SnoozeError {
    /// Panel API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors talking to the management panel
#[derive(Error, Debug)]
pub enum ApiError {
    /// Credentials rejected, or token still rejected after re-login
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Panel unreachable, timed out or connection dropped
    #[error("Transport error: {0}")]
    Transport(String),

    /// Panel answered with an unexpected status
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Panel answered with a body we could not understand
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this error means the session is not authorized
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

/// Decoy listener errors
#[derive(Error, Debug)]
pub enum ListenerError {
    /// Port already bound by something else
    #[error("Failed to bind port {port}: {source}")]
    PortBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Bind address could not be parsed
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

/// Wake registry invariant violations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Server already has a decoy listener
    #[error("Server {0} already has a decoy listener")]
    AlreadyListening(ServerId),

    /// Another server's decoy holds the port
    #[error("Port {port} is already held by the decoy for server {holder}")]
    PortClaimed { port: u16, holder: ServerId },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
