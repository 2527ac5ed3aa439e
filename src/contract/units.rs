//! Conversion between ether amounts typed by users and wei on the wire.

use thiserror::Error;

pub const ETHER_DECIMALS: u32 = 18;
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid ether amount {0:?}")]
    Invalid(String),
    #[error("ether amount {0:?} has more than 18 decimal places")]
    TooPrecise(String),
    #[error("ether amount {0:?} overflows")]
    Overflow(String),
}

/// Parses a decimal ether amount such as `"1.5"` into wei.
pub fn parse_ether(amount: &str) -> Result<u128, UnitsError> {
    let trimmed = amount.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitsError::Invalid(amount.to_string()));
    }
    if fraction.len() > ETHER_DECIMALS as usize {
        return Err(UnitsError::TooPrecise(amount.to_string()));
    }

    let overflow = || UnitsError::Overflow(amount.to_string());
    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| overflow())?
            .checked_mul(WEI_PER_ETHER)
            .ok_or_else(overflow)?
    };
    let fraction_wei = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(ETHER_DECIMALS - fraction.len() as u32);
        fraction.parse::<u128>().map_err(|_| overflow())? * scale
    };

    whole_wei.checked_add(fraction_wei).ok_or_else(overflow)
}

/// Formats wei as a decimal ether amount without trailing zeros.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let fraction = wei % WEI_PER_ETHER;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:018}", fraction);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
