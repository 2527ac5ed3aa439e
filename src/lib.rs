//! FlightSurety oracle server library
//!
//! Simulates a decentralized oracle network for the FlightSurety contracts and
//! provides the client binding used to request flight statuses, buy and claim
//! insurance.

pub mod app_state;
pub mod client;
pub mod config;
pub mod contract;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
