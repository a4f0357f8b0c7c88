//! Shared serialization/deserialization utilities for configuration

/// Helper module for Duration serialization as seconds
///
/// Intervals and timeouts are written as whole seconds in TOML:
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "snooze_core::config::serde_utils::duration_secs")]
///     check_interval: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_secs")]
        check_interval: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let config = TestConfig {
            check_interval: Duration::from_secs(15),
        };
        let toml = toml::to_string(&config).unwrap();
        assert_eq!(toml.trim(), "check_interval = 15");
    }

    #[test]
    fn test_duration_secs_deserialize() {
        let config: TestConfig = toml::from_str("check_interval = 60").unwrap();
        assert_eq!(config.check_interval, Duration::from_secs(60));
    }
}
