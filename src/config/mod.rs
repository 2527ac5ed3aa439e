//! Runtime configuration loaded from the environment.

use std::env;
use std::str::FromStr;

use thiserror::Error;

pub mod client;
pub mod contracts;
pub mod oracles;

pub use client::ClientConfig;
pub use contracts::ContractsConfig;
pub use oracles::{select_oracle_accounts, OracleConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("oracle pool needs {required} accounts besides the funding account, only {available} available")]
    InsufficientAccounts { required: usize, available: usize },
    #[error("funding account index {index} is out of range for {available} accounts")]
    FundingAccountOutOfRange { index: usize, available: usize },
    #[error("oracle pool size must be at least 1")]
    EmptyPool,
}

/// Reads `key`, falling back to `default` when unset.
pub(crate) fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

pub(crate) fn env_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => parse_value(key, &value).map(Some),
        _ => Ok(None),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
