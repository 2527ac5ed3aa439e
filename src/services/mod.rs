//! Background services of the oracle server

pub mod oracle_service;
pub mod status_policy;

pub use oracle_service::{
    restart_backoff, BootstrapError, OraclePool, OracleResponder, ResponderError, RoundSummary,
};
pub use status_policy::{StatusGenerator, StatusPolicy};
