//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! { "expiry": { "enabled": true, "cutoff_hour": 16, "cutoff_minute": 0, "slack_millis": 100 } }
//! ```

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub expiry: ExpiryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expiry: ExpiryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config for batch replays where wall-clock expiry must not interfere
    pub fn without_expiry() -> Self {
        Self {
            expiry: ExpiryConfig {
                enabled: false,
                ..ExpiryConfig::default()
            },
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.expiry.cutoff_time().map(|_| ())
    }
}

/// When good-for-day orders are swept from the book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    pub enabled: bool,
    /// UTC hour of the daily cutoff
    pub cutoff_hour: u32,
    pub cutoff_minute: u32,
    /// Extra wait past the cutoff before sweeping
    pub slack_millis: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff_hour: 16,
            cutoff_minute: 0,
            slack_millis: 100,
        }
    }
}

impl ExpiryConfig {
    pub fn cutoff_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::from_hms_opt(self.cutoff_hour, self.cutoff_minute, 0).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "expiry cutoff {:02}:{:02} is not a time of day",
                self.cutoff_hour, self.cutoff_minute
            ))
        })
    }

    pub fn slack(&self) -> Duration {
        Duration::from_millis(self.slack_millis)
    }
}

/// Time left until the next occurrence of `cutoff`. At or past today's cutoff
/// the next one is tomorrow's.
pub fn time_until_cutoff(now: DateTime<Utc>, cutoff: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(cutoff).and_utc();
    let next = if now < today {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

#[derive(Debug)]
pub enum ConfigError {
    /// Reading the config file or starting the expiry worker failed
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Malformed config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.expiry.enabled);
        assert_eq!(
            config.expiry.cutoff_time().unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap()
        );
        assert_eq!(config.expiry.slack(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{"expiry": {"cutoff_hour": 21}}"#).unwrap();
        assert_eq!(config.expiry.cutoff_hour, 21);
        assert_eq!(config.expiry.cutoff_minute, 0);
        assert!(config.expiry.enabled);

        let empty = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(empty, EngineConfig::default());
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let result = EngineConfig::from_json_str(r#"{"expiry": {"cutoff_hour": 24}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EngineConfig::from_json_str("not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_time_until_cutoff_same_day() {
        let cutoff = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(
            time_until_cutoff(at(15, 30, 0), cutoff),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_time_until_cutoff_rolls_to_next_day() {
        let cutoff = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(
            time_until_cutoff(at(16, 0, 0), cutoff),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            time_until_cutoff(at(17, 0, 0), cutoff),
            Duration::from_secs(23 * 3600)
        );
    }

    #[test]
    fn test_without_expiry() {
        assert!(!EngineConfig::without_expiry().expiry.enabled);
    }
}
