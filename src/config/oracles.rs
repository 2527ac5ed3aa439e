use crate::models::Address;
use crate::services::status_policy::StatusPolicy;

use super::{env_or, ConfigError};

pub const DEFAULT_POOL_SIZE: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleConfig {
    pub pool_size: usize,
    pub funding_account_index: usize,
    pub status_policy: StatusPolicy,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            funding_account_index: 0,
            status_policy: StatusPolicy::default(),
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            pool_size: env_or("ORACLE_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            funding_account_index: env_or("ORACLE_FUNDING_ACCOUNT_INDEX", 0usize)?,
            status_policy: env_or("ORACLE_STATUS_POLICY", StatusPolicy::default())?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        Ok(())
    }
}

/// Picks the oracle accounts out of the node's account list.
///
/// The funding account never becomes an oracle. The pool is taken from the
/// tail of the remaining accounts so it stays clear of the owner, airline and
/// passenger accounts the client uses at the head of the list.
pub fn select_oracle_accounts(
    config: &OracleConfig,
    accounts: &[Address],
) -> Result<Vec<Address>, ConfigError> {
    config.validate()?;
    if config.funding_account_index >= accounts.len() {
        return Err(ConfigError::FundingAccountOutOfRange {
            index: config.funding_account_index,
            available: accounts.len(),
        });
    }

    let candidates: Vec<Address> = accounts
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != config.funding_account_index)
        .map(|(_, account)| *account)
        .collect();

    if candidates.len() < config.pool_size {
        return Err(ConfigError::InsufficientAccounts {
            required: config.pool_size,
            available: candidates.len(),
        });
    }

    Ok(candidates[candidates.len() - config.pool_size..].to_vec())
}
