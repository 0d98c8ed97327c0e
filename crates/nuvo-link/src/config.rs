//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Settings for one amplifier session
///
/// Every field has a default, so a config file only needs to name the port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Serial port path
    #[serde(default)]
    pub port: String,
    /// Baud rate (framing is always 8N1)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Granularity of a single read, also the idle check while draining
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Total wait for a reply after a command is written
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Attempts made by a status query before giving up
    #[serde(default = "default_status_attempts")]
    pub status_attempts: u32,
    /// Pause between status query attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Highest zone id installed
    #[serde(default = "default_max_zone")]
    pub max_zone: u8,
    /// Highest source id installed
    #[serde(default = "default_max_source")]
    pub max_source: u8,
}

fn default_baud_rate() -> u32 {
    57600
}

fn default_io_timeout_ms() -> u64 {
    400
}

fn default_response_timeout_ms() -> u64 {
    2500
}

fn default_status_attempts() -> u32 {
    4
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_zone() -> u8 {
    20
}

fn default_max_source() -> u8 {
    6
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            io_timeout_ms: default_io_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            status_attempts: default_status_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_zone: default_max_zone(),
            max_source: default_max_source(),
        }
    }
}

impl SessionConfig {
    /// Create a config for a port with default timing
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Per-read timeout
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Reply deadline
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Retry policy for status queries
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.status_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
