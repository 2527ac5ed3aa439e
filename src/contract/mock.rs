//! Scripted in-memory contract used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{ContractError, FlightSuretyContract, Logged, Subscription, TxHash};
use crate::models::{
    Address, FlightStatusInfo, OracleIndexes, OracleRequest, OracleResponse, StatusCode,
};

type Sender<T> = UnboundedSender<Result<Logged<T>, ContractError>>;

#[derive(Default)]
pub(crate) struct MockState {
    pub accounts: Vec<Address>,
    pub operational: bool,
    pub fee: u128,
    pub fee_fails: bool,
    pub indexes: HashMap<Address, OracleIndexes>,
    pub failing_registrations: HashSet<Address>,
    pub failing_index_queries: HashSet<Address>,
    pub failing_submissions: HashSet<Address>,
    pub registered: Vec<(Address, u128)>,
    pub index_queries: usize,
    pub submissions: Vec<(Address, OracleResponse)>,
    pub status_requests: Vec<(Address, Address, String, u64)>,
    pub fetch_fails: bool,
    /// Status the contract resolves each request with, and after how long.
    pub resolve_with: Option<(StatusCode, Duration)>,
    pub credit: u128,
    pub withdrawals: usize,
    pub withdraw_fails: bool,
    pub claims: Vec<(Address, String)>,
    pub purchases: Vec<(Address, String, u128)>,
    pub flights: Vec<(Address, String)>,
    pub funded: Vec<(Address, u128)>,
    pub airlines: HashSet<Address>,
    /// Block of the most recently emitted event.
    pub block: u64,
    /// Starting block requested by each `oracle_requests` call.
    pub request_subscriptions: Vec<Option<u64>>,
    request_subscribers: Vec<Sender<OracleRequest>>,
    status_subscribers: Vec<Sender<FlightStatusInfo>>,
}

#[derive(Default)]
pub(crate) struct MockContract {
    state: Mutex<MockState>,
}

pub(crate) fn account(i: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = i;
    bytes[0] = 0xac;
    Address(bytes)
}

fn reverted(reason: &str) -> ContractError {
    ContractError::Rpc {
        code: -32000,
        message: format!("VM Exception while processing transaction: revert {reason}"),
    }
}

impl MockContract {
    pub fn with_accounts(count: u8) -> Self {
        let contract = Self::default();
        {
            let mut state = contract.state();
            state.accounts = (0..count).map(account).collect();
            state.operational = true;
            state.fee = 1_000_000_000_000_000_000;
        }
        contract
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Emits `request` in a new block.
    pub fn emit_request(&self, request: OracleRequest) {
        let mut state = self.state();
        state.block += 1;
        let logged = Logged {
            block_number: state.block,
            event: request,
        };
        state
            .request_subscribers
            .retain(|tx| tx.send(Ok(logged.clone())).is_ok());
    }

    /// Emits `info` in a new block.
    pub fn emit_status(&self, info: FlightStatusInfo) {
        let mut state = self.state();
        state.block += 1;
        let logged = Logged {
            block_number: state.block,
            event: info,
        };
        state
            .status_subscribers
            .retain(|tx| tx.send(Ok(logged.clone())).is_ok());
    }

    pub fn break_request_stream(&self) {
        for tx in self.state().request_subscribers.drain(..) {
            let _ = tx.send(Err(ContractError::MalformedResponse(
                "filter not found".to_string(),
            )));
        }
    }

    fn tx_hash(prefix: &str, n: usize) -> TxHash {
        format!("0x{prefix}{n:060x}")
    }
}

#[async_trait]
impl FlightSuretyContract for MockContract {
    async fn accounts(&self) -> Result<Vec<Address>, ContractError> {
        Ok(self.state().accounts.clone())
    }

    async fn is_operational(&self, _from: Address) -> Result<bool, ContractError> {
        Ok(self.state().operational)
    }

    async fn registration_fee(&self, _from: Address) -> Result<u128, ContractError> {
        let state = self.state();
        if state.fee_fails {
            return Err(reverted("fee unavailable"));
        }
        Ok(state.fee)
    }

    async fn register_oracle(&self, from: Address, fee: u128) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        if state.failing_registrations.contains(&from) {
            return Err(reverted("registration failed"));
        }
        if fee < state.fee {
            return Err(reverted("Registration fee is required"));
        }
        state.registered.push((from, fee));
        Ok(Self::tx_hash("01", state.registered.len()))
    }

    async fn get_my_indexes(&self, from: Address) -> Result<OracleIndexes, ContractError> {
        let mut state = self.state();
        state.index_queries += 1;
        if state.failing_index_queries.contains(&from) {
            return Err(reverted("Not registered as an oracle"));
        }
        state
            .indexes
            .get(&from)
            .copied()
            .ok_or_else(|| reverted("Not registered as an oracle"))
    }

    async fn submit_oracle_response(
        &self,
        from: Address,
        response: &OracleResponse,
    ) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        if state.failing_submissions.contains(&from) {
            return Err(reverted("Flight or timestamp do not match oracle request"));
        }
        state.submissions.push((from, response.clone()));
        Ok(Self::tx_hash("02", state.submissions.len()))
    }

    async fn fetch_flight_status(
        &self,
        from: Address,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        if state.fetch_fails {
            return Err(reverted("Contract is currently not operational"));
        }
        state
            .status_requests
            .push((from, airline, flight.to_string(), timestamp));

        state.block += 1;
        let request = Logged {
            block_number: state.block,
            event: OracleRequest {
                index: 0,
                airline,
                flight: flight.to_string(),
                timestamp,
            },
        };
        state
            .request_subscribers
            .retain(|tx| tx.send(Ok(request.clone())).is_ok());

        if let Some((status, delay)) = state.resolve_with {
            let subscribers = state.status_subscribers.clone();
            let info = Logged {
                block_number: state.block + 1,
                event: FlightStatusInfo {
                    airline,
                    flight: flight.to_string(),
                    timestamp,
                    status,
                },
            };
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for tx in subscribers {
                    let _ = tx.send(Ok(info.clone()));
                }
            });
        }
        Ok(Self::tx_hash("03", state.status_requests.len()))
    }

    async fn buy_insurance(&self, from: Address, flight: &str, value: u128) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        state.purchases.push((from, flight.to_string(), value));
        Ok(Self::tx_hash("04", state.purchases.len()))
    }

    async fn claim_insurance(&self, from: Address, flight: &str) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        state.claims.push((from, flight.to_string()));
        Ok(Self::tx_hash("05", state.claims.len()))
    }

    async fn get_credit(&self, _from: Address) -> Result<u128, ContractError> {
        Ok(self.state().credit)
    }

    async fn withdraw_credit(&self, _from: Address) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        if state.withdraw_fails {
            return Err(reverted("withdraw failed"));
        }
        state.credit = 0;
        state.withdrawals += 1;
        Ok(Self::tx_hash("06", state.withdrawals))
    }

    async fn register_flight(&self, from: Address, flight: &str) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        state.flights.push((from, flight.to_string()));
        Ok(Self::tx_hash("07", state.flights.len()))
    }

    async fn register_airline(&self, _from: Address, airline: Address) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        state.airlines.insert(airline);
        Ok(Self::tx_hash("08", state.airlines.len()))
    }

    async fn is_airline(&self, _from: Address, airline: Address) -> Result<bool, ContractError> {
        Ok(self.state().airlines.contains(&airline))
    }

    async fn fund(&self, from: Address, value: u128) -> Result<TxHash, ContractError> {
        let mut state = self.state();
        state.funded.push((from, value));
        Ok(Self::tx_hash("09", state.funded.len()))
    }

    async fn oracle_requests(
        &self,
        from_block: Option<u64>,
    ) -> Result<Subscription<OracleRequest>, ContractError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.request_subscriptions.push(from_block);
        state.request_subscribers.push(tx);
        Ok(rx)
    }

    async fn flight_status_info(&self) -> Result<Subscription<FlightStatusInfo>, ContractError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().status_subscribers.push(tx);
        Ok(rx)
    }
}
