use std::time::Duration;

use crate::models::Address;

use super::{env_opt, env_or, ConfigError};

pub const DEFAULT_GAS: u64 = 4_712_388;
pub const DEFAULT_GAS_PRICE: u128 = 100_000_000_000;

#[derive(Clone, Debug)]
pub struct ContractsConfig {
    pub rpc_url: String,
    pub app_address: Address,
    pub data_address: Option<Address>,
    pub gas: u64,
    pub gas_price: u128,
    pub poll_interval: Duration,
}

impl ContractsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_address = env_opt("FLIGHT_SURETY_APP_ADDRESS")?
            .ok_or(ConfigError::Missing("FLIGHT_SURETY_APP_ADDRESS"))?;

        Ok(Self {
            rpc_url: env_or("ETH_RPC_URL", "http://127.0.0.1:8545".to_string())?,
            app_address,
            data_address: env_opt("FLIGHT_SURETY_DATA_ADDRESS")?,
            gas: env_or("ETH_GAS", DEFAULT_GAS)?,
            gas_price: env_or("ETH_GAS_PRICE", DEFAULT_GAS_PRICE)?,
            poll_interval: Duration::from_millis(env_or("EVENT_POLL_INTERVAL_MS", 1_000u64)?),
        })
    }

    pub fn new(rpc_url: impl Into<String>, app_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            app_address,
            data_address: None,
            gas: DEFAULT_GAS,
            gas_price: DEFAULT_GAS_PRICE,
            poll_interval: Duration::from_secs(1),
        }
    }
}
