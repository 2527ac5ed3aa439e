//! Application state shared across handlers

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::services::OraclePool;

/// Shared application state
#[derive(Clone, Default)]
pub struct AppState {
    pub oracle_pool: Arc<RwLock<OraclePool>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the pool once bootstrap has finished.
    pub async fn set_oracle_pool(&self, pool: OraclePool) {
        *self.oracle_pool.write().await = pool;
    }
}
