use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Address;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown flight status code {0}")]
pub struct InvalidStatusCode(pub u8);

/// Flight status codes as published by the FlightSurety contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum StatusCode {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl StatusCode {
    /// Every code an oracle may report for a known flight.
    pub const REPORTABLE: [StatusCode; 5] = [
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Unknown => "Unknown",
            StatusCode::OnTime => "On Time",
            StatusCode::LateAirline => "Late - Airline",
            StatusCode::LateWeather => "Late - Weather",
            StatusCode::LateTechnical => "Late - Technical",
            StatusCode::LateOther => "Late - Other",
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = InvalidStatusCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Unknown),
            10 => Ok(StatusCode::OnTime),
            20 => Ok(StatusCode::LateAirline),
            30 => Ok(StatusCode::LateWeather),
            40 => Ok(StatusCode::LateTechnical),
            50 => Ok(StatusCode::LateOther),
            other => Err(InvalidStatusCode(other)),
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Request broadcast by the contract asking oracles holding `index` to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

/// A single oracle's answer to an [`OracleRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub status: StatusCode,
}

impl OracleResponse {
    pub fn answering(request: &OracleRequest, status: StatusCode) -> Self {
        Self {
            index: request.index,
            airline: request.airline,
            flight: request.flight.clone(),
            timestamp: request.timestamp,
            status,
        }
    }
}

/// Resolution event emitted once the contract accepted a status for a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightStatusInfo {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub status: StatusCode,
}
