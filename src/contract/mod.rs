//! Binding to the external FlightSurety contracts.
//!
//! The contracts are the source of truth for airline registration, insurance,
//! oracle consensus and payouts; this module only maps calls and events.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{Address, FlightStatusInfo, OracleIndexes, OracleRequest, OracleResponse};

pub mod abi;
pub mod rpc;
pub mod units;

#[cfg(test)]
pub(crate) mod mock;

pub use abi::{AbiError, FlightSuretyAbi};
pub use rpc::RpcContract;

/// Transaction hash as reported by the node.
pub type TxHash = String;

/// A decoded contract event and the block that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logged<T> {
    pub block_number: u64,
    pub event: T,
}

/// Stream of decoded contract events. An `Err` item ends the stream.
pub type Subscription<T> = mpsc::UnboundedReceiver<Result<Logged<T>, ContractError>>;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("rpc transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),
    #[error("abi decoding failed: {0}")]
    Abi(#[from] AbiError),
    #[error("{0} contract address is not configured")]
    NotConfigured(&'static str),
    #[error("unexpected status code in contract data: {0}")]
    Status(#[from] crate::models::flight::InvalidStatusCode),
}

/// Operations of `FlightSuretyApp` and `FlightSuretyData` used off-chain.
///
/// `from` is the account that signs a transaction or is used as `msg.sender`
/// for a read call.
#[async_trait]
pub trait FlightSuretyContract: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>, ContractError>;

    async fn is_operational(&self, from: Address) -> Result<bool, ContractError>;

    async fn registration_fee(&self, from: Address) -> Result<u128, ContractError>;

    async fn register_oracle(&self, from: Address, fee: u128) -> Result<TxHash, ContractError>;

    async fn get_my_indexes(&self, from: Address) -> Result<OracleIndexes, ContractError>;

    async fn submit_oracle_response(
        &self,
        from: Address,
        response: &OracleResponse,
    ) -> Result<TxHash, ContractError>;

    async fn fetch_flight_status(
        &self,
        from: Address,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<TxHash, ContractError>;

    async fn buy_insurance(
        &self,
        from: Address,
        flight: &str,
        value: u128,
    ) -> Result<TxHash, ContractError>;

    async fn claim_insurance(&self, from: Address, flight: &str) -> Result<TxHash, ContractError>;

    async fn get_credit(&self, from: Address) -> Result<u128, ContractError>;

    async fn withdraw_credit(&self, from: Address) -> Result<TxHash, ContractError>;

    async fn register_flight(&self, from: Address, flight: &str) -> Result<TxHash, ContractError>;

    async fn register_airline(
        &self,
        from: Address,
        airline: Address,
    ) -> Result<TxHash, ContractError>;

    async fn is_airline(&self, from: Address, airline: Address) -> Result<bool, ContractError>;

    async fn fund(&self, from: Address, value: u128) -> Result<TxHash, ContractError>;

    /// `OracleRequest` events from `from_block`, or from the latest block when
    /// `None`.
    async fn oracle_requests(
        &self,
        from_block: Option<u64>,
    ) -> Result<Subscription<OracleRequest>, ContractError>;

    /// `FlightStatusInfo` events from the latest block onwards.
    async fn flight_status_info(&self) -> Result<Subscription<FlightStatusInfo>, ContractError>;
}
