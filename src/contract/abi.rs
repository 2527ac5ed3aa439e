//! FlightSurety contract ABIs and token conversions, backed by `ethabi`.

use ethabi::{Contract, Event, Function, Hash, RawLog, Token};
use thiserror::Error;

use crate::models::{Address, OracleIndexes};

const APP_ABI: &str = include_str!("../../abi/FlightSuretyApp.json");
const DATA_ABI: &str = include_str!("../../abi/FlightSuretyData.json");

#[derive(Debug, Error)]
pub enum AbiError {
    #[error(transparent)]
    Ethabi(#[from] ethabi::Error),
    #[error("expected {expected}, decoded {found}")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("value {value} does not fit in {target}")]
    Overflow { value: String, target: &'static str },
    #[error("missing {0} in decoded data")]
    Missing(&'static str),
    #[error("invalid hex payload: {0}")]
    Hex(String),
}

/// Parsed ABIs of `FlightSuretyApp` and `FlightSuretyData`.
#[derive(Debug, Clone)]
pub struct FlightSuretyAbi {
    app: Contract,
    data: Contract,
}

impl FlightSuretyAbi {
    pub fn load() -> Result<Self, AbiError> {
        Ok(Self {
            app: Contract::load(APP_ABI.as_bytes())?,
            data: Contract::load(DATA_ABI.as_bytes())?,
        })
    }

    pub fn app_function(&self, name: &str) -> Result<&Function, AbiError> {
        Ok(self.app.function(name)?)
    }

    pub fn data_function(&self, name: &str) -> Result<&Function, AbiError> {
        Ok(self.data.function(name)?)
    }

    pub fn app_event(&self, name: &str) -> Result<&Event, AbiError> {
        Ok(self.app.event(name)?)
    }
}

pub fn encode_input(function: &Function, args: &[Token]) -> Result<Vec<u8>, AbiError> {
    Ok(function.encode_input(args)?)
}

/// Decodes the return data of `function` and yields its first value.
pub fn decode_output(function: &Function, data: &[u8]) -> Result<Token, AbiError> {
    function
        .decode_output(data)?
        .into_iter()
        .next()
        .ok_or(AbiError::Missing("return value"))
}

/// Named parameters of a parsed log.
pub struct LogParams(Vec<ethabi::LogParam>);

impl LogParams {
    pub fn parse(event: &Event, topics: Vec<Hash>, data: Vec<u8>) -> Result<Self, AbiError> {
        let log = event.parse_log(RawLog { topics, data })?;
        Ok(Self(log.params))
    }

    pub fn take(&mut self, name: &'static str) -> Result<Token, AbiError> {
        let position = self
            .0
            .iter()
            .position(|param| param.name == name)
            .ok_or(AbiError::Missing(name))?;
        Ok(self.0.swap_remove(position).value)
    }
}

pub fn topic(event: &Event) -> String {
    format!("0x{}", hex::encode(event.signature().as_bytes()))
}

pub fn decode_hex(data: &str) -> Result<Vec<u8>, AbiError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|e| AbiError::Hex(e.to_string()))
}

pub fn decode_topic(topic: &str) -> Result<Hash, AbiError> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != 32 {
        return Err(AbiError::Hex(format!("topic {topic} is not 32 bytes")));
    }
    Ok(Hash::from_slice(&bytes))
}

pub fn address(address: Address) -> Token {
    Token::Address(ethabi::Address::from(address.0))
}

pub fn uint(value: u128) -> Token {
    Token::Uint(ethabi::Uint::from(value))
}

pub fn string(value: &str) -> Token {
    Token::String(value.to_string())
}

fn unexpected(expected: &'static str, found: Token) -> AbiError {
    AbiError::UnexpectedToken {
        expected,
        found: format!("{found:?}"),
    }
}

pub fn to_address(token: Token) -> Result<Address, AbiError> {
    match token {
        Token::Address(value) => Ok(Address(value.0)),
        other => Err(unexpected("address", other)),
    }
}

pub fn to_bool(token: Token) -> Result<bool, AbiError> {
    match token {
        Token::Bool(value) => Ok(value),
        other => Err(unexpected("bool", other)),
    }
}

pub fn to_string(token: Token) -> Result<String, AbiError> {
    match token {
        Token::String(value) => Ok(value),
        other => Err(unexpected("string", other)),
    }
}

pub fn to_u128(token: Token) -> Result<u128, AbiError> {
    match token {
        Token::Uint(value) if value.bits() <= 128 => Ok(value.low_u128()),
        Token::Uint(value) => Err(AbiError::Overflow {
            value: value.to_string(),
            target: "u128",
        }),
        other => Err(unexpected("uint", other)),
    }
}

pub fn to_u64(token: Token) -> Result<u64, AbiError> {
    let value = to_u128(token)?;
    u64::try_from(value).map_err(|_| AbiError::Overflow {
        value: value.to_string(),
        target: "u64",
    })
}

pub fn to_u8(token: Token) -> Result<u8, AbiError> {
    let value = to_u128(token)?;
    u8::try_from(value).map_err(|_| AbiError::Overflow {
        value: value.to_string(),
        target: "u8",
    })
}

/// `uint8[3]` index triplet returned by `getMyIndexes`.
pub fn to_indexes(token: Token) -> Result<OracleIndexes, AbiError> {
    match token {
        Token::FixedArray(items) if items.len() == 3 => {
            let mut indexes = [0u8; 3];
            for (slot, item) in indexes.iter_mut().zip(items) {
                *slot = to_u8(item)?;
            }
            Ok(indexes)
        }
        other => Err(unexpected("uint8[3]", other)),
    }
}
