//! Server list entry returned to status requests

use serde::{Deserialize, Serialize};

/// JSON body of a status response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Advertised game version
    pub version: StatusVersion,
    /// Player counts shown in the server list
    pub players: StatusPlayers,
    /// MOTD line
    pub description: Description,
}

/// Version block of a status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVersion {
    /// Human readable version, e.g. "1.19.2"
    pub name: String,
    /// Protocol number; clients on another number see "outdated"
    pub protocol: i32,
}

/// Player block of a status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
}

/// MOTD, either a bare string or a text component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Component { text: String },
    Plain(String),
}

impl StatusResponse {
    /// Status for a server with nobody online
    pub fn new(
        motd: impl Into<String>,
        version_name: impl Into<String>,
        protocol: i32,
        max_players: u32,
    ) -> Self {
        Self {
            version: StatusVersion {
                name: version_name.into(),
                protocol,
            },
            players: StatusPlayers {
                max: max_players,
                online: 0,
            },
            description: Description::Component { text: motd.into() },
        }
    }

    /// The advertised MOTD text
    pub fn motd(&self) -> &str {
        match &self.description {
            Description::Component { text } | Description::Plain(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json_shape() {
        let status = StatusResponse::new("Sleeping", "1.19.2", 760, 20);
        let json: serde_json::Value = serde_json::to_value(&status).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "version": { "name": "1.19.2", "protocol": 760 },
                "players": { "max": 20, "online": 0 },
                "description": { "text": "Sleeping" }
            })
        );
    }

    #[test]
    fn test_plain_description() {
        let json = r#"{"version":{"name":"1.20.1","protocol":763},"players":{"max":10,"online":3,"sample":[]},"description":"hello"}"#;
        let status: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(status.motd(), "hello");
        assert_eq!(status.players.online, 3);
    }
}
