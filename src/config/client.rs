use std::time::Duration;

use super::{env_or, ConfigError};

pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long to wait for oracle consensus after requesting a status.
    pub status_timeout: Duration,
    /// Age in seconds after which a fetched status must be refetched.
    pub freshness_window_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            status_timeout: Duration::from_millis(env_or(
                "STATUS_TIMEOUT_MS",
                DEFAULT_STATUS_TIMEOUT.as_millis() as u64,
            )?),
            freshness_window_secs: env_or(
                "FRESHNESS_WINDOW_SECS",
                DEFAULT_FRESHNESS_WINDOW_SECS,
            )?,
        })
    }
}
