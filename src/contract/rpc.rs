//! FlightSurety binding over Ethereum JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the node must manage
//! the signing accounts (as a development chain does). Events are followed by
//! polling `eth_getLogs` with a block cursor.

use std::sync::Arc;

use async_trait::async_trait;
use ethabi::{Event, Token};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::abi::{self, FlightSuretyAbi, LogParams};
use super::{ContractError, FlightSuretyContract, Logged, Subscription, TxHash};
use crate::config::ContractsConfig;
use crate::models::{
    Address, FlightStatusInfo, OracleIndexes, OracleRequest, OracleResponse, StatusCode,
};

const MAX_BLOCK_RANGE: u64 = 200;

#[derive(Clone)]
pub struct RpcContract {
    config: ContractsConfig,
    abi: Arc<FlightSuretyAbi>,
    http: Client,
}

impl RpcContract {
    pub fn new(config: ContractsConfig) -> Result<Self, ContractError> {
        Ok(Self {
            config,
            abi: Arc::new(FlightSuretyAbi::load()?),
            http: Client::new(),
        })
    }

    fn data_address(&self) -> Result<Address, ContractError> {
        self.config
            .data_address
            .ok_or(ContractError::NotConfigured("FlightSuretyData"))
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ContractError> {
        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(ContractError::Rpc {
                code: error.pointer("/code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .pointer("/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ContractError::MalformedResponse(format!("{method} returned no result")))
    }

    async fn call(&self, to: Address, from: Address, data: Vec<u8>) -> Result<Vec<u8>, ContractError> {
        let result = self
            .rpc_call(
                "eth_call",
                json!([
                    {
                        "from": from.to_string(),
                        "to": to.to_string(),
                        "data": format!("0x{}", hex::encode(data)),
                    },
                    "latest"
                ]),
            )
            .await?;

        let encoded = result
            .as_str()
            .ok_or_else(|| ContractError::MalformedResponse("eth_call result is not a string".into()))?;
        Ok(abi::decode_hex(encoded)?)
    }

    async fn send(
        &self,
        to: Address,
        from: Address,
        data: Vec<u8>,
        value: u128,
    ) -> Result<TxHash, ContractError> {
        let mut tx = json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
            "gas": quantity(u128::from(self.config.gas)),
            "gasPrice": quantity(self.config.gas_price),
        });
        if value > 0 {
            tx["value"] = json!(quantity(value));
        }

        let result = self.rpc_call("eth_sendTransaction", json!([tx])).await?;
        result
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| ContractError::MalformedResponse("transaction hash is not a string".into()))
    }

    async fn app_call(&self, from: Address, name: &str, args: &[Token]) -> Result<Token, ContractError> {
        let function = self.abi.app_function(name)?;
        let data = self
            .call(self.config.app_address, from, abi::encode_input(function, args)?)
            .await?;
        Ok(abi::decode_output(function, &data)?)
    }

    async fn app_send(
        &self,
        from: Address,
        name: &str,
        args: &[Token],
        value: u128,
    ) -> Result<TxHash, ContractError> {
        let data = abi::encode_input(self.abi.app_function(name)?, args)?;
        self.send(self.config.app_address, from, data, value).await
    }

    async fn data_call(&self, from: Address, name: &str, args: &[Token]) -> Result<Token, ContractError> {
        let function = self.abi.data_function(name)?;
        let data = self
            .call(self.data_address()?, from, abi::encode_input(function, args)?)
            .await?;
        Ok(abi::decode_output(function, &data)?)
    }

    async fn data_send(
        &self,
        from: Address,
        name: &str,
        args: &[Token],
        value: u128,
    ) -> Result<TxHash, ContractError> {
        let data = abi::encode_input(self.abi.data_function(name)?, args)?;
        self.send(self.data_address()?, from, data, value).await
    }

    async fn block_number(&self) -> Result<u64, ContractError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }

    /// Fetches logs for `topic` from `from_block` up to the chain head.
    ///
    /// Returns `None` when no new block exists yet, otherwise the logs and the
    /// last block covered.
    async fn poll_logs(&self, topic: &str, from_block: u64) -> Result<Option<(Vec<Value>, u64)>, ContractError> {
        let latest = self.block_number().await?;
        if from_block > latest {
            return Ok(None);
        }

        // Limit the range per cycle to keep requests predictable.
        let to_block = latest.min(from_block + MAX_BLOCK_RANGE);
        let result = self
            .rpc_call(
                "eth_getLogs",
                json!([{
                    "fromBlock": quantity(u128::from(from_block)),
                    "toBlock": quantity(u128::from(to_block)),
                    "address": self.config.app_address.to_string(),
                    "topics": [topic],
                }]),
            )
            .await?;

        let logs = result
            .as_array()
            .cloned()
            .ok_or_else(|| ContractError::MalformedResponse("eth_getLogs result is not an array".into()))?;
        Ok(Some((logs, to_block)))
    }

    async fn subscribe<T>(
        &self,
        event_name: &'static str,
        from_block: Option<u64>,
        decode: fn(&Event, &Value) -> Result<T, ContractError>,
    ) -> Result<Subscription<T>, ContractError>
    where
        T: Send + 'static,
    {
        let event = self.abi.app_event(event_name)?.clone();
        let start = match from_block {
            Some(block) => block,
            None => self.block_number().await?,
        };
        let topic = abi::topic(&event);
        let (tx, rx) = mpsc::unbounded_channel();
        let contract = self.clone();

        tokio::spawn(async move {
            let mut next_block = start;
            loop {
                if tx.is_closed() {
                    debug!(event = event_name, "subscriber dropped; stopping log poller");
                    return;
                }

                match contract.poll_logs(&topic, next_block).await {
                    Ok(Some((logs, last_block))) => {
                        for log in logs {
                            let decoded = parse_quantity(&log["blockNumber"]).and_then(|block_number| {
                                Ok(Logged {
                                    block_number,
                                    event: decode(&event, &log)?,
                                })
                            });
                            match decoded {
                                Ok(logged) => {
                                    if tx.send(Ok(logged)).is_err() {
                                        return;
                                    }
                                }
                                Err(err) => {
                                    warn!(event = event_name, error = %err, "skipping undecodable log")
                                }
                            }
                        }
                        next_block = last_block + 1;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        return;
                    }
                }

                sleep(contract.config.poll_interval).await;
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl FlightSuretyContract for RpcContract {
    async fn accounts(&self) -> Result<Vec<Address>, ContractError> {
        let result = self.rpc_call("eth_accounts", json!([])).await?;
        result
            .as_array()
            .ok_or_else(|| ContractError::MalformedResponse("eth_accounts result is not an array".into()))?
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ContractError::MalformedResponse(format!("bad account {value}")))
            })
            .collect()
    }

    async fn is_operational(&self, from: Address) -> Result<bool, ContractError> {
        let token = self.app_call(from, "isOperational", &[]).await?;
        Ok(abi::to_bool(token)?)
    }

    async fn registration_fee(&self, from: Address) -> Result<u128, ContractError> {
        let token = self.app_call(from, "REGISTRATION_FEE", &[]).await?;
        Ok(abi::to_u128(token)?)
    }

    async fn register_oracle(&self, from: Address, fee: u128) -> Result<TxHash, ContractError> {
        self.app_send(from, "registerOracle", &[], fee).await
    }

    async fn get_my_indexes(&self, from: Address) -> Result<OracleIndexes, ContractError> {
        let token = self.app_call(from, "getMyIndexes", &[]).await?;
        Ok(abi::to_indexes(token)?)
    }

    async fn submit_oracle_response(
        &self,
        from: Address,
        response: &OracleResponse,
    ) -> Result<TxHash, ContractError> {
        let args = [
            abi::uint(u128::from(response.index)),
            abi::address(response.airline),
            abi::string(&response.flight),
            abi::uint(u128::from(response.timestamp)),
            abi::uint(u128::from(response.status.code())),
        ];
        self.app_send(from, "submitOracleResponse", &args, 0).await
    }

    async fn fetch_flight_status(
        &self,
        from: Address,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<TxHash, ContractError> {
        let args = [
            abi::address(airline),
            abi::string(flight),
            abi::uint(u128::from(timestamp)),
        ];
        self.app_send(from, "fetchFlightStatus", &args, 0).await
    }

    async fn buy_insurance(&self, from: Address, flight: &str, value: u128) -> Result<TxHash, ContractError> {
        self.app_send(from, "buyInsurance", &[abi::string(flight)], value)
            .await
    }

    async fn claim_insurance(&self, from: Address, flight: &str) -> Result<TxHash, ContractError> {
        self.app_send(from, "claimInsurance", &[abi::string(flight)], 0)
            .await
    }

    async fn get_credit(&self, from: Address) -> Result<u128, ContractError> {
        let token = self.app_call(from, "getCredit", &[]).await?;
        Ok(abi::to_u128(token)?)
    }

    async fn withdraw_credit(&self, from: Address) -> Result<TxHash, ContractError> {
        self.app_send(from, "withdrawCredit", &[], 0).await
    }

    async fn register_flight(&self, from: Address, flight: &str) -> Result<TxHash, ContractError> {
        self.app_send(from, "registerFlight", &[abi::string(flight)], 0)
            .await
    }

    async fn register_airline(&self, from: Address, airline: Address) -> Result<TxHash, ContractError> {
        self.data_send(from, "registerAirline", &[abi::address(airline)], 0)
            .await
    }

    async fn is_airline(&self, from: Address, airline: Address) -> Result<bool, ContractError> {
        let token = self.data_call(from, "isAirline", &[abi::address(airline)]).await?;
        Ok(abi::to_bool(token)?)
    }

    async fn fund(&self, from: Address, value: u128) -> Result<TxHash, ContractError> {
        self.data_send(from, "fund", &[], value).await
    }

    async fn oracle_requests(
        &self,
        from_block: Option<u64>,
    ) -> Result<Subscription<OracleRequest>, ContractError> {
        self.subscribe("OracleRequest", from_block, decode_oracle_request)
            .await
    }

    async fn flight_status_info(&self) -> Result<Subscription<FlightStatusInfo>, ContractError> {
        self.subscribe("FlightStatusInfo", None, decode_flight_status_info)
            .await
    }
}

fn log_params(event: &Event, log: &Value) -> Result<LogParams, ContractError> {
    let topics = log
        .pointer("/topics")
        .and_then(Value::as_array)
        .ok_or_else(|| ContractError::MalformedResponse("log without topics".into()))?
        .iter()
        .map(|topic| {
            topic
                .as_str()
                .ok_or_else(|| ContractError::MalformedResponse(format!("bad topic {topic}")))
                .and_then(|topic| Ok(abi::decode_topic(topic)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let data = log
        .pointer("/data")
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::MalformedResponse("log without data".into()))?;
    Ok(LogParams::parse(event, topics, abi::decode_hex(data)?)?)
}

pub fn decode_oracle_request(event: &Event, log: &Value) -> Result<OracleRequest, ContractError> {
    let mut params = log_params(event, log)?;
    Ok(OracleRequest {
        index: abi::to_u8(params.take("index")?)?,
        airline: abi::to_address(params.take("airline")?)?,
        flight: abi::to_string(params.take("flight")?)?,
        timestamp: abi::to_u64(params.take("timestamp")?)?,
    })
}

pub fn decode_flight_status_info(event: &Event, log: &Value) -> Result<FlightStatusInfo, ContractError> {
    let mut params = log_params(event, log)?;
    Ok(FlightStatusInfo {
        airline: abi::to_address(params.take("airline")?)?,
        flight: abi::to_string(params.take("flight")?)?,
        timestamp: abi::to_u64(params.take("timestamp")?)?,
        status: StatusCode::try_from(abi::to_u8(params.take("status")?)?)?,
    })
}

fn quantity(value: u128) -> String {
    format!("{value:#x}")
}

fn parse_quantity(value: &Value) -> Result<u64, ContractError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ContractError::MalformedResponse(format!("quantity {value} is not a string")))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|_| ContractError::MalformedResponse(format!("bad quantity {raw}")))
}
