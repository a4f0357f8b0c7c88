//! Core domain types

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Panel identifier of a managed server
///
/// Older panels send numeric ids, newer ones UUID strings; both are kept as
/// text so that they can be put back into request paths unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerId(pub String);

impl ServerId {
    /// Create a new server ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for ServerId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ServerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => ServerId::from(n),
            RawId::Text(s) => ServerId(s),
        })
    }
}

/// One game server as listed by the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServer {
    /// Panel identifier
    #[serde(alias = "serverId")]
    pub server_id: ServerId,
    /// Display name
    #[serde(alias = "serverName")]
    pub server_name: String,
    /// Port the game server listens on
    #[serde(alias = "serverPort")]
    pub server_port: u16,
    /// Instance type tag, e.g. "minecraft-java"
    #[serde(rename = "type", default)]
    pub server_type: String,
}

/// Runtime snapshot of a server for one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    /// Process is running
    pub running: bool,
    /// A start command is being processed upstream
    pub waiting_start: bool,
    /// Start of the current run, in the configured offset
    pub started: Option<DateTime<FixedOffset>>,
    /// Players online
    pub online: u32,
    /// Free text description (usually the server's MOTD)
    pub desc: String,
}

impl ServerStats {
    /// Stats for a server that is not running
    pub fn stopped() -> Self {
        Self {
            running: false,
            waiting_start: false,
            started: None,
            online: 0,
            desc: String::new(),
        }
    }

    /// Whole minutes the server has been running with nobody online.
    ///
    /// `None` unless the server is running, not starting, has a known start
    /// time and has zero players.
    pub fn idle_minutes(&self, now: DateTime<FixedOffset>) -> Option<i64> {
        if !self.running || self.waiting_start || self.online > 0 {
            return None;
        }
        self.started
            .map(|started| crate::time::elapsed_minutes(started, now))
    }

    /// Whether the server has been empty for at least `threshold_minutes`
    pub fn is_idle_expired(&self, now: DateTime<FixedOffset>, threshold_minutes: u64) -> bool {
        let threshold = i64::try_from(threshold_minutes).unwrap_or(i64::MAX);
        self.idle_minutes(now)
            .map(|minutes| minutes >= threshold)
            .unwrap_or(false)
    }
}

/// Lifecycle of a decoy listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    /// Port bound, answering pings, waiting for a join
    Open,
    /// A client started logging in
    ConnectionObserved,
    /// Port released; terminal
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Open => write!(f, "open"),
            ListenerState::ConnectionObserved => write!(f, "connection-observed"),
            ListenerState::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes_ago: i64) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        (now - Duration::minutes(minutes_ago), now)
    }

    fn running(started: DateTime<FixedOffset>, online: u32) -> ServerStats {
        ServerStats {
            running: true,
            waiting_start: false,
            started: Some(started),
            online,
            desc: String::new(),
        }
    }

    #[test]
    fn test_server_id_from_number_or_string() {
        let numeric: ServerId = serde_json::from_str("7").unwrap();
        let text: ServerId = serde_json::from_str(r#""3f2a-uuid""#).unwrap();
        assert_eq!(numeric, ServerId::new("7"));
        assert_eq!(text.as_str(), "3f2a-uuid");
    }

    #[test]
    fn test_managed_server_deserialize() {
        let json = r#"{
            "server_id": 1,
            "server_name": "Survival",
            "server_port": 25565,
            "type": "minecraft-java",
            "created": "2022-10-01 10:00:00"
        }"#;
        let server: ManagedServer = serde_json::from_str(json).unwrap();
        assert_eq!(server.server_id, ServerId::new("1"));
        assert_eq!(server.server_name, "Survival");
        assert_eq!(server.server_port, 25565);
        assert_eq!(server.server_type, "minecraft-java");
    }

    #[test]
    fn test_managed_server_camel_case_keys() {
        let json = r#"{"serverId":"abc","serverName":"Lobby","serverPort":25566}"#;
        let server: ManagedServer = serde_json::from_str(json).unwrap();
        assert_eq!(server.server_id.as_str(), "abc");
        assert_eq!(server.server_port, 25566);
        assert!(server.server_type.is_empty());
    }

    #[test]
    fn test_idle_expired_after_threshold() {
        let (started, now) = at(11);
        assert!(running(started, 0).is_idle_expired(now, 10));
        assert_eq!(running(started, 0).idle_minutes(now), Some(11));
    }

    #[test]
    fn test_not_idle_before_threshold() {
        let (started, now) = at(9);
        assert!(!running(started, 0).is_idle_expired(now, 10));
    }

    #[test]
    fn test_huge_threshold_never_expires() {
        let (started, now) = at(60 * 24 * 365);
        assert!(!running(started, 0).is_idle_expired(now, u64::MAX));
        assert!(!running(started, 0).is_idle_expired(now, i64::MAX as u64 + 1));
    }

    #[test]
    fn test_not_idle_with_players() {
        let (started, now) = at(60);
        assert!(!running(started, 2).is_idle_expired(now, 10));
        assert_eq!(running(started, 2).idle_minutes(now), None);
    }

    #[test]
    fn test_not_idle_while_starting_or_stopped() {
        let (started, now) = at(60);

        let mut starting = running(started, 0);
        starting.waiting_start = true;
        assert!(!starting.is_idle_expired(now, 10));

        let mut unknown_start = running(started, 0);
        unknown_start.started = None;
        assert!(!unknown_start.is_idle_expired(now, 10));

        assert!(!ServerStats::stopped().is_idle_expired(now, 10));
    }

    #[test]
    fn test_listener_state_display() {
        assert_eq!(format!("{}", ListenerState::Open), "open");
        assert_eq!(format!("{}", ListenerState::Closed), "closed");
    }
}
