//! Daemon configuration

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Configuration for the snooze daemon
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Base URL of the panel API, e.g. `https://panel:8443/api/v2/`
    pub api_url: String,

    /// Panel user
    pub username: String,

    /// Panel password
    pub password: String,

    /// Host the decoy listeners bind to
    pub bind_host: String,

    /// UTC offset used for idle calculations, e.g. `-03:00`
    pub utc_offset: String,

    /// Minutes a server may stay empty before it is stopped
    pub inactive_minutes: u64,

    /// Time between reconciliation ticks
    #[serde(with = "duration_secs")]
    pub check_interval: Duration,

    /// Timeout for each panel request
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Accept self-signed panel certificates
    pub accept_invalid_certs: bool,

    /// What the decoy listeners advertise
    pub decoy: DecoyConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            username: String::new(),
            password: String::new(),
            bind_host: "0.0.0.0".to_string(),
            utc_offset: "+00:00".to_string(),
            inactive_minutes: 10,
            check_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            decoy: DecoyConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Check that the daemon can run with this configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api_url".to_string()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::MissingField("username".to_string()));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingField("password".to_string()));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "check_interval must be at least one second".to_string(),
            ));
        }
        if self.decoy.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "decoy.handshake_timeout must be at least one second".to_string(),
            ));
        }
        self.offset()?;
        Ok(())
    }

    /// Parsed `utc_offset`
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        crate::time::parse_utc_offset(&self.utc_offset)
    }
}

// Hand-written so the password never ends up in logs
impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("bind_host", &self.bind_host)
            .field("utc_offset", &self.utc_offset)
            .field("inactive_minutes", &self.inactive_minutes)
            .field("check_interval", &self.check_interval)
            .field("request_timeout", &self.request_timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("decoy", &self.decoy)
            .finish()
    }
}

/// What a decoy listener shows to game clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoyConfig {
    /// Server list MOTD
    pub motd: String,

    /// Kick message sent to the client that woke the server
    pub disconnect_message: String,

    /// Advertised version name
    pub version_name: String,

    /// Advertised protocol number (760 is 1.19.1/1.19.2)
    pub protocol_version: i32,

    /// Advertised player slots
    pub max_players: u32,

    /// How long one client may take to finish its handshake
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            motd: "Server is sleeping. Try to connect and wait a moment for it to wake up."
                .to_string(),
            disconnect_message:
                "The server was woken up and is starting, please wait a moment and try again."
                    .to_string(),
            version_name: "1.19.2".to_string(),
            protocol_version: 760,
            max_players: 20,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
