//! Synthetic flight status generation for the simulated oracle network.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::ConfigError;
use crate::models::StatusCode;

/// How oracles pick the status code they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Every oracle reports the same code.
    Fixed(StatusCode),
    /// Uniform draw over the reportable codes, reproducible when seeded.
    Random { seed: Option<u64> },
}

impl Default for StatusPolicy {
    fn default() -> Self {
        StatusPolicy::Fixed(StatusCode::LateAirline)
    }
}

impl FromStr for StatusPolicy {
    type Err = ConfigError;

    /// Accepts `fixed:<code>`, `random` or `random:<seed>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid {
            key: "ORACLE_STATUS_POLICY",
            value: s.to_string(),
        };
        let (kind, arg) = match s.trim().split_once(':') {
            Some((kind, arg)) => (kind, Some(arg.trim())),
            None => (s.trim(), None),
        };

        match (kind, arg) {
            ("fixed", Some(code)) => {
                let code: u8 = code.parse().map_err(|_| invalid())?;
                let status = StatusCode::try_from(code).map_err(|_| invalid())?;
                Ok(StatusPolicy::Fixed(status))
            }
            ("random", None) => Ok(StatusPolicy::Random { seed: None }),
            ("random", Some(seed)) => Ok(StatusPolicy::Random {
                seed: Some(seed.parse().map_err(|_| invalid())?),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPolicy::Fixed(status) => write!(f, "fixed:{}", status.code()),
            StatusPolicy::Random { seed: None } => write!(f, "random"),
            StatusPolicy::Random { seed: Some(seed) } => write!(f, "random:{seed}"),
        }
    }
}

pub struct StatusGenerator {
    policy: StatusPolicy,
    rng: Mutex<StdRng>,
}

impl StatusGenerator {
    pub fn new(policy: StatusPolicy) -> Self {
        let rng = match policy {
            StatusPolicy::Random { seed: Some(seed) } => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };
        Self {
            policy,
            rng: Mutex::new(rng),
        }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn next_status(&self) -> StatusCode {
        match self.policy {
            StatusPolicy::Fixed(status) => status,
            StatusPolicy::Random { .. } => {
                let mut rng = match self.rng.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *StatusCode::REPORTABLE
                    .choose(&mut *rng)
                    .unwrap_or(&StatusCode::Unknown)
            }
        }
    }
}
