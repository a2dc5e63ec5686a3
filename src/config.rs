//! Engine configuration.
//!
//! All timing behavior is tunable; the defaults come from
//! [`crate::constants`]. Hosts typically construct this once at startup,
//! either from a TOML file or via [`EngineConfig::default`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    MAILBOX_POLL_SECS, READ_MARK_DEBOUNCE_MS, SEARCH_DEBOUNCE_MS, SEND_POLL_MAX_ATTEMPTS,
    SEND_POLL_MS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet window for batching mark-as-read mutations (milliseconds)
    #[serde(default = "default_read_mark_debounce_ms")]
    pub read_mark_debounce_ms: u64,
    /// Quiet window before typed search text commits (milliseconds)
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Interval between mailbox list refreshes (seconds)
    #[serde(default = "default_mailbox_poll_secs")]
    pub mailbox_poll_secs: u64,
    /// Interval between send task status polls (milliseconds)
    #[serde(default = "default_send_poll_ms")]
    pub send_poll_ms: u64,
    /// Send task polls before giving up
    #[serde(default = "default_send_poll_max_attempts")]
    pub send_poll_max_attempts: u32,
}

fn default_read_mark_debounce_ms() -> u64 {
    READ_MARK_DEBOUNCE_MS
}

fn default_search_debounce_ms() -> u64 {
    SEARCH_DEBOUNCE_MS
}

fn default_mailbox_poll_secs() -> u64 {
    MAILBOX_POLL_SECS
}

fn default_send_poll_ms() -> u64 {
    SEND_POLL_MS
}

fn default_send_poll_max_attempts() -> u32 {
    SEND_POLL_MAX_ATTEMPTS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_mark_debounce_ms: default_read_mark_debounce_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            mailbox_poll_secs: default_mailbox_poll_secs(),
            send_poll_ms: default_send_poll_ms(),
            send_poll_max_attempts: default_send_poll_max_attempts(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text. Missing fields fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn read_mark_debounce(&self) -> Duration {
        Duration::from_millis(self.read_mark_debounce_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn mailbox_poll(&self) -> Duration {
        Duration::from_secs(self.mailbox_poll_secs)
    }

    pub fn send_poll(&self) -> Duration {
        Duration::from_millis(self.send_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.read_mark_debounce_ms, READ_MARK_DEBOUNCE_MS);
        assert_eq!(config.search_debounce_ms, SEARCH_DEBOUNCE_MS);
        assert_eq!(config.mailbox_poll_secs, MAILBOX_POLL_SECS);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("read_mark_debounce_ms = 100").unwrap();
        assert_eq!(config.read_mark_debounce_ms, 100);
        assert_eq!(config.search_debounce_ms, SEARCH_DEBOUNCE_MS);
        assert_eq!(config.read_mark_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.send_poll_ms, SEND_POLL_MS);
        assert_eq!(config.send_poll_max_attempts, SEND_POLL_MAX_ATTEMPTS);
    }
}
