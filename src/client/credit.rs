/// Locally known insurance credit of the client's owner account.
///
/// Bookkeeping only: the contract itself prevents double withdrawal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CreditLedger {
    credit_wei: u128,
}

impl CreditLedger {
    pub fn credit(&self) -> u128 {
        self.credit_wei
    }

    pub fn update(&mut self, credit_wei: u128) {
        self.credit_wei = credit_wei;
    }

    pub fn can_withdraw(&self) -> bool {
        self.credit_wei > 0
    }

    /// Clears the credit after a successful withdrawal and returns the amount.
    pub fn settle(&mut self) -> u128 {
        std::mem::take(&mut self.credit_wei)
    }
}
