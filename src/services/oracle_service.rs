//! Simulated oracle network: registration of a fixed pool of accounts and
//! answering `OracleRequest` events on their behalf.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{select_oracle_accounts, ConfigError, OracleConfig};
use crate::contract::{ContractError, FlightSuretyContract, Logged, Subscription};
use crate::models::{Address, Oracle, OracleRequest, OracleResponse};
use crate::services::status_policy::{StatusGenerator, StatusPolicy};

const RESPONDER_MAX_BACKOFF_SECONDS: u64 = 30;

/// Delay before resubscribing after the `restart_count`-th lost subscription.
pub fn restart_backoff(restart_count: u32) -> Duration {
    let seconds = 2u64.saturating_pow(restart_count.min(5)).min(RESPONDER_MAX_BACKOFF_SECONDS);
    Duration::from_secs(seconds)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not list node accounts: {0}")]
    Accounts(#[source] ContractError),
    #[error("could not retrieve registration fee: {0}")]
    RegistrationFee(#[source] ContractError),
}

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("oracle request subscription failed: {0}")]
    Subscription(#[from] ContractError),
    #[error("oracle request subscription closed")]
    Closed,
}

/// Oracles that registered successfully, with their cached indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OraclePool {
    oracles: Vec<Oracle>,
}

impl OraclePool {
    pub fn new(oracles: Vec<Oracle>) -> Self {
        Self { oracles }
    }

    pub fn oracles(&self) -> &[Oracle] {
        &self.oracles
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    pub fn matching(&self, index: u8) -> impl Iterator<Item = &Oracle> + '_ {
        self.oracles.iter().filter(move |oracle| oracle.responds_to(index))
    }

    /// Registers the configured pool with the contract.
    ///
    /// Only a configuration problem or an unreadable registration fee aborts
    /// the bootstrap. An account whose registration or index lookup fails is
    /// left out of the pool and the others carry on.
    pub async fn bootstrap<C>(contract: &C, config: &OracleConfig) -> Result<Self, BootstrapError>
    where
        C: FlightSuretyContract + ?Sized,
    {
        let accounts = contract.accounts().await.map_err(BootstrapError::Accounts)?;
        let selected = select_oracle_accounts(config, &accounts)?;
        let funder = accounts[config.funding_account_index];
        info!(
            available = accounts.len(),
            pool_size = selected.len(),
            "selected oracle accounts"
        );

        let fee = contract
            .registration_fee(funder)
            .await
            .map_err(BootstrapError::RegistrationFee)?;
        info!(fee_wei = %fee, "contract requires registration fee per oracle");

        let registrations = join_all(selected.iter().map(|account| async move {
            match contract.register_oracle(*account, fee).await {
                Ok(tx_hash) => {
                    info!(oracle = %account, %tx_hash, "registered oracle");
                    Some(*account)
                }
                Err(err) => {
                    warn!(oracle = %account, error = %err, "could not register oracle");
                    None
                }
            }
        }))
        .await;
        let registered: Vec<Address> = registrations.into_iter().flatten().collect();

        let lookups = join_all(registered.iter().map(|account| async move {
            match contract.get_my_indexes(*account).await {
                Ok(indexes) => {
                    info!(
                        oracle = %account,
                        "assigned indices: {}, {}, {}",
                        indexes[0],
                        indexes[1],
                        indexes[2]
                    );
                    Some(Oracle::new(*account, indexes))
                }
                Err(err) => {
                    warn!(oracle = %account, error = %err, "could not retrieve oracle indices");
                    None
                }
            }
        }))
        .await;
        let pool = Self::new(lookups.into_iter().flatten().collect());

        if pool.is_empty() {
            error!("no oracle registered successfully; requests will go unanswered");
        } else {
            info!(
                oracles = pool.len(),
                excluded = selected.len() - pool.len(),
                "oracle pool ready"
            );
        }
        Ok(pool)
    }
}

/// Outcome of answering one request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub matched: usize,
    pub submitted: usize,
    pub failed: usize,
}

pub struct OracleResponder<C: ?Sized> {
    contract: Arc<C>,
    pool: OraclePool,
    statuses: StatusGenerator,
    /// First block not yet handled; `None` until a request was answered.
    resume_from: Mutex<Option<u64>>,
}

impl<C> OracleResponder<C>
where
    C: FlightSuretyContract + ?Sized,
{
    pub fn new(contract: Arc<C>, pool: OraclePool, policy: StatusPolicy) -> Self {
        Self {
            contract,
            pool,
            statuses: StatusGenerator::new(policy),
            resume_from: Mutex::new(None),
        }
    }

    fn mark_handled(&self, block_number: u64) {
        let mut resume_from = lock(&self.resume_from);
        let next = block_number.saturating_add(1);
        if resume_from.map_or(true, |current| next > current) {
            *resume_from = Some(next);
        }
    }

    /// Submits a response from every oracle holding the request index.
    pub async fn respond(&self, request: &OracleRequest) -> RoundSummary {
        let responses: Vec<(Address, OracleResponse)> = self
            .pool
            .matching(request.index)
            .map(|oracle| {
                let status = self.statuses.next_status();
                (oracle.account, OracleResponse::answering(request, status))
            })
            .collect();

        let contract = &self.contract;
        let results = join_all(responses.iter().map(|(account, response)| async move {
            info!(
                oracle = %account,
                flight = %response.flight,
                status = %response.status,
                "submitting oracle response"
            );
            match contract.submit_oracle_response(*account, response).await {
                Ok(tx_hash) => {
                    info!(oracle = %account, %tx_hash, "oracle response submitted");
                    true
                }
                Err(err) => {
                    warn!(oracle = %account, error = %err, "could not submit oracle response");
                    false
                }
            }
        }))
        .await;

        let submitted = results.iter().filter(|ok| **ok).count();
        RoundSummary {
            matched: results.len(),
            submitted,
            failed: results.len() - submitted,
        }
    }

    /// Answers requests until the subscription fails or closes.
    pub async fn run(&self, mut requests: Subscription<OracleRequest>) -> ResponderError {
        info!(
            oracles = self.pool.len(),
            policy = %self.statuses.policy(),
            "listening for oracle requests"
        );

        while let Some(event) = requests.recv().await {
            match event {
                Ok(Logged {
                    block_number,
                    event: request,
                }) => {
                    info!(
                        index = request.index,
                        airline = %request.airline,
                        flight = %request.flight,
                        timestamp = request.timestamp,
                        "caught oracle request"
                    );
                    let summary = self.respond(&request).await;
                    info!(
                        matched = summary.matched,
                        submitted = summary.submitted,
                        failed = summary.failed,
                        "oracle request handled"
                    );
                    self.mark_handled(block_number);
                }
                Err(err) => return ResponderError::Subscription(err),
            }
        }
        ResponderError::Closed
    }

    /// Subscribes to request events and answers them. After a lost
    /// subscription, resumes at the block following the last handled request.
    pub async fn listen(&self) -> ResponderError {
        let from_block = *lock(&self.resume_from);
        debug!(?from_block, "subscribing to oracle requests");
        match self.contract.oracle_requests(from_block).await {
            Ok(requests) => self.run(requests).await,
            Err(err) => ResponderError::Subscription(err),
        }
    }
}
