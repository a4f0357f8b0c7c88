//! Panel response payloads
//!
//! The panel wraps every answer in `{"status": "...", "data": ...}`. Stats
//! use a few loose encodings that are normalized here before they reach the
//! reconciliation loop.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use snooze_core::error::ApiError;
use snooze_core::time::parse_panel_timestamp;
use snooze_core::ServerStats;

/// Standard response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Take `data`, or explain why it is missing
    pub fn into_data(self, what: &str) -> Result<T, ApiError> {
        match self.data {
            Some(data) => Ok(data),
            None => Err(ApiError::Decode(format!(
                "{} response has no data (status: {}, error: {})",
                what,
                self.status.as_deref().unwrap_or("-"),
                self.error.as_deref().unwrap_or("-"),
            ))),
        }
    }
}

/// Body of `POST auth/login`
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `data` of a login response
#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
}

/// `started` as the panel sends it
///
/// A running server carries a timestamp; a stopped one carries the string
/// `"False"`, a boolean, an empty string or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum StartedField {
    Flag(bool),
    Text(String),
}

/// `data` of `GET servers/{id}/stats`
#[derive(Debug, Deserialize)]
pub(crate) struct RawStats {
    #[serde(default)]
    pub running: bool,
    #[serde(default, alias = "waitingStart")]
    pub waiting_start: bool,
    #[serde(default)]
    pub started: Option<StartedField>,
    #[serde(default)]
    pub online: Option<u32>,
    #[serde(default)]
    pub desc: Option<String>,
}

impl RawStats {
    /// Normalize into `ServerStats`, moving `started` into `offset`
    pub fn into_stats(self, offset: FixedOffset) -> Result<ServerStats, ApiError> {
        let started = match self.started {
            None | Some(StartedField::Flag(_)) => None,
            Some(StartedField::Text(text)) => {
                let text = text.trim();
                if text.is_empty() || text.eq_ignore_ascii_case("false") {
                    None
                } else {
                    let utc = parse_panel_timestamp(text).ok_or_else(|| {
                        ApiError::Decode(format!("unrecognized started timestamp '{}'", text))
                    })?;
                    Some(utc.with_timezone(&offset))
                }
            }
        };

        Ok(ServerStats {
            running: self.running,
            waiting_start: self.waiting_start,
            started,
            online: self.online.unwrap_or(0),
            desc: self.desc.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(json: &str) -> Result<ServerStats, ApiError> {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let raw: RawStats = serde_json::from_str(json).unwrap();
        raw.into_stats(offset)
    }

    #[test]
    fn test_false_sentinel_is_absent() {
        let stats = parse(r#"{"running": false, "waiting_start": false, "started": "False", "online": 0, "desc": "A server"}"#).unwrap();
        assert!(!stats.running);
        assert!(stats.started.is_none());
        assert_eq!(stats.desc, "A server");
    }

    #[test]
    fn test_other_not_started_encodings() {
        for started in [r#"false"#, r#"null"#, r#""""#, r#""false""#] {
            let json = format!(r#"{{"running": false, "started": {}}}"#, started);
            assert!(parse(&json).unwrap().started.is_none(), "started = {}", started);
        }
        assert!(parse(r#"{"running": false}"#).unwrap().started.is_none());
    }

    #[test]
    fn test_started_converted_to_offset() {
        let stats = parse(r#"{"running": true, "waiting_start": false, "started": "2022-10-10 15:00:00", "online": 2}"#).unwrap();

        let started = stats.started.unwrap();
        assert_eq!(started.offset().local_minus_utc(), -3 * 3600);
        assert_eq!(
            started.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2022, 10, 10, 15, 0, 0).unwrap()
        );
        assert_eq!(stats.online, 2);
    }

    #[test]
    fn test_camel_case_waiting_start() {
        let stats = parse(r#"{"running": false, "waitingStart": true}"#).unwrap();
        assert!(stats.waiting_start);
    }

    #[test]
    fn test_garbage_started_is_decode_error() {
        let result = parse(r#"{"running": true, "started": "half past noon"}"#);
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_envelope_without_data() {
        let envelope: Envelope<LoginData> =
            serde_json::from_str(r#"{"status": "error", "error": "ACCESS_DENIED"}"#).unwrap();
        let err = envelope.into_data("login").unwrap_err();
        assert!(err.to_string().contains("ACCESS_DENIED"));
    }
}
