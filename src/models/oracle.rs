use serde::{Deserialize, Serialize};

use super::Address;

/// The three indices the contract assigns to an oracle at registration.
pub type OracleIndexes = [u8; 3];

/// A registered oracle account and its cached index assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub account: Address,
    pub indexes: OracleIndexes,
}

impl Oracle {
    pub fn new(account: Address, indexes: OracleIndexes) -> Self {
        Self { account, indexes }
    }

    /// Only oracles holding the request index may answer it.
    pub fn responds_to(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}
