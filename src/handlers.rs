//! API handlers for the FlightSurety oracle server

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::models::{ApiResponse, Oracle};

pub async fn root() -> &'static str {
    "FlightSurety Oracle Server"
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Static liveness payload for the dApp.
pub async fn api_root() -> Json<Value> {
    Json(json!({
        "message": "An API for use with your Dapp!"
    }))
}

/// Registered oracles and their assigned indices.
pub async fn list_oracles(State(app_state): State<AppState>) -> Json<ApiResponse<Vec<Oracle>>> {
    let pool = app_state.oracle_pool.read().await;
    Json(ApiResponse::ok(pool.oracles().to_vec()))
}
