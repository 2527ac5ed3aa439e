//! Passenger/airline side of the dApp: requests flight statuses, buys and
//! claims insurance and manages credit through the FlightSurety contracts.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::contract::units::{self, UnitsError};
use crate::contract::{ContractError, FlightSuretyContract, Logged, TxHash};
use crate::models::{Address, FlightStatusInfo, StatusCode};

mod completion;
mod credit;
mod tracker;

pub use completion::{completion, Completion, Outcome};
pub use credit::CreditLedger;
pub use tracker::FetchTracker;

const AIRLINE_ACCOUNTS: usize = 5;
const PASSENGER_ACCOUNTS: usize = 5;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("node returned no accounts")]
    NoAccounts,
    #[error("no airline account available")]
    NoAirline,
    #[error("flight name must not be empty")]
    EmptyFlight,
    #[error("Oracles did not reach a consensus. Sorry! Please try again.")]
    ConsensusTimeout,
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// Role assignment over the node's account list: owner first, then airlines,
/// then passengers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientAccounts {
    pub owner: Address,
    pub airlines: Vec<Address>,
    pub passengers: Vec<Address>,
}

impl ClientAccounts {
    pub fn from_accounts(accounts: &[Address]) -> Result<Self, ClientError> {
        let (owner, rest) = accounts.split_first().ok_or(ClientError::NoAccounts)?;
        let airlines: Vec<Address> = rest.iter().take(AIRLINE_ACCOUNTS).copied().collect();
        let passengers = rest
            .iter()
            .skip(airlines.len())
            .take(PASSENGER_ACCOUNTS)
            .copied()
            .collect();
        Ok(Self {
            owner: *owner,
            airlines,
            passengers,
        })
    }

    pub fn first_airline(&self) -> Result<Address, ClientError> {
        self.airlines.first().copied().ok_or(ClientError::NoAirline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub flight: String,
    pub amount_wei: u128,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    /// Status fetched before claiming, when the cached one was stale.
    pub refreshed_status: Option<StatusCode>,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WithdrawOutcome {
    NothingToWithdraw,
    Withdrawn { amount_wei: u128, tx_hash: TxHash },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundReceipt {
    pub funds_wei: u128,
    pub funder: Address,
    pub active: bool,
}

enum Resolution {
    Resolved(FlightStatusInfo),
    TimedOut,
}

pub struct FlightSuretyClient<C: ?Sized> {
    contract: Arc<C>,
    accounts: ClientAccounts,
    config: ClientConfig,
    tracker: Mutex<FetchTracker>,
    credit: Mutex<CreditLedger>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

impl<C> FlightSuretyClient<C>
where
    C: FlightSuretyContract + ?Sized,
{
    pub fn new(contract: Arc<C>, accounts: ClientAccounts, config: ClientConfig) -> Self {
        let tracker = FetchTracker::new(config.freshness_window_secs);
        Self {
            contract,
            accounts,
            config,
            tracker: Mutex::new(tracker),
            credit: Mutex::new(CreditLedger::default()),
        }
    }

    /// Reads the node's accounts and assigns client roles.
    pub async fn connect(contract: Arc<C>, config: ClientConfig) -> Result<Self, ClientError> {
        let accounts = ClientAccounts::from_accounts(&contract.accounts().await?)?;
        debug!(owner = %accounts.owner, airlines = accounts.airlines.len(), "client accounts loaded");
        Ok(Self::new(contract, accounts, config))
    }

    pub fn accounts(&self) -> &ClientAccounts {
        &self.accounts
    }

    pub async fn is_operational(&self) -> Result<bool, ClientError> {
        Ok(self.contract.is_operational(self.accounts.owner).await?)
    }

    /// Asks the oracles for the flight's status and waits for consensus.
    ///
    /// Resolves exactly once: with the agreed status if the contract emits
    /// `FlightStatusInfo` for this request before the timeout, otherwise with
    /// [`ClientError::ConsensusTimeout`].
    pub async fn fetch_flight_status(&self, flight: &str) -> Result<StatusCode, ClientError> {
        if flight.trim().is_empty() {
            return Err(ClientError::EmptyFlight);
        }
        let airline = self.accounts.first_airline()?;
        let timestamp = now_secs();

        // Subscribe before sending so neither event can be missed.
        let mut requests = self.contract.oracle_requests(None).await?;
        let mut resolutions = self.contract.flight_status_info().await?;

        let tx_hash = self
            .contract
            .fetch_flight_status(self.accounts.owner, airline, flight, timestamp)
            .await?;
        info!(flight, timestamp, %tx_hash, "requested flight status from oracles");

        let (completion, outcome) = completion::<Resolution>();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(3);

        let watched = flight.to_string();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.recv().await {
                match event {
                    Ok(Logged { event: request, .. }) if request.flight == watched => {
                        info!(index = request.index, flight = %request.flight, "oracles asked for flight status");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "oracle request subscription failed");
                        break;
                    }
                }
            }
        }));

        let watched = flight.to_string();
        let resolver = completion.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = resolutions.recv().await {
                match event {
                    Ok(Logged { event: info, .. })
                        if info.flight == watched && info.timestamp == timestamp =>
                    {
                        resolver.complete(Resolution::Resolved(info));
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "flight status subscription failed");
                        break;
                    }
                }
            }
        }));

        let timeout = self.config.status_timeout;
        let timer = completion.clone();
        tasks.push(tokio::spawn(async move {
            sleep(timeout).await;
            timer.complete(Resolution::TimedOut);
        }));
        drop(completion);

        let resolution = outcome.wait().await;
        for task in tasks {
            task.abort();
        }

        match resolution {
            Some(Resolution::Resolved(info)) => {
                lock(&self.tracker).record(&info.flight, info.timestamp);
                info!(flight = %info.flight, status = %info.status, "flight status resolved");
                Ok(info.status)
            }
            Some(Resolution::TimedOut) | None => {
                warn!(flight, "oracles did not reach a consensus in time");
                Err(ClientError::ConsensusTimeout)
            }
        }
    }

    /// True iff this client resolved the flight's status within the
    /// freshness window.
    pub fn is_fetched(&self, flight: &str) -> bool {
        lock(&self.tracker).is_fresh_at(flight, now_secs())
    }

    pub async fn buy_insurance(&self, flight: &str, ether: &str) -> Result<PurchaseReceipt, ClientError> {
        if flight.trim().is_empty() {
            return Err(ClientError::EmptyFlight);
        }
        let amount_wei = units::parse_ether(ether)?;
        let tx_hash = self
            .contract
            .buy_insurance(self.accounts.owner, flight, amount_wei)
            .await?;
        info!(flight, amount_wei = %amount_wei, %tx_hash, "insurance bought");
        Ok(PurchaseReceipt {
            flight: flight.to_string(),
            amount_wei,
            tx_hash,
        })
    }

    /// Claims insurance, refreshing the flight status first when stale.
    pub async fn claim_insurance(&self, flight: &str) -> Result<ClaimReceipt, ClientError> {
        let refreshed_status = if self.is_fetched(flight) {
            None
        } else {
            Some(self.fetch_flight_status(flight).await?)
        };

        let tx_hash = self
            .contract
            .claim_insurance(self.accounts.owner, flight)
            .await?;
        info!(flight, %tx_hash, "insurance claimed");
        Ok(ClaimReceipt {
            refreshed_status,
            tx_hash,
        })
    }

    /// Reads the owner's credit from the contract and remembers it locally.
    pub async fn get_credit(&self) -> Result<u128, ClientError> {
        let credit = self.contract.get_credit(self.accounts.owner).await?;
        lock(&self.credit).update(credit);
        Ok(credit)
    }

    pub fn local_credit(&self) -> CreditLedger {
        *lock(&self.credit)
    }

    /// Withdraws the known credit. A no-op while no credit is known.
    pub async fn withdraw(&self) -> Result<WithdrawOutcome, ClientError> {
        let amount_wei = lock(&self.credit).credit();
        if amount_wei == 0 {
            debug!("no credit to withdraw");
            return Ok(WithdrawOutcome::NothingToWithdraw);
        }

        let tx_hash = self.contract.withdraw_credit(self.accounts.owner).await?;
        lock(&self.credit).settle();
        info!(amount_wei = %amount_wei, %tx_hash, "credit withdrawn");
        Ok(WithdrawOutcome::Withdrawn { amount_wei, tx_hash })
    }

    pub async fn register_flight(&self, flight: &str) -> Result<TxHash, ClientError> {
        if flight.trim().is_empty() {
            return Err(ClientError::EmptyFlight);
        }
        let airline = self.accounts.first_airline()?;
        let tx_hash = self.contract.register_flight(airline, flight).await?;
        info!(flight, %airline, %tx_hash, "flight registered");
        Ok(tx_hash)
    }

    /// Funds the data contract and registers the owner as an airline.
    ///
    /// The funding account is read from the node before any transaction is
    /// sent, and each step only runs once the previous one succeeded.
    pub async fn fund(&self, ether: &str) -> Result<FundReceipt, ClientError> {
        let funds_wei = units::parse_ether(ether)?;
        let funder = *self
            .contract
            .accounts()
            .await?
            .first()
            .ok_or(ClientError::NoAccounts)?;

        let fund_tx = self.contract.fund(funder, funds_wei).await?;
        debug!(%funder, funds_wei = %funds_wei, %fund_tx, "data contract funded");
        let register_tx = self
            .contract
            .register_airline(funder, self.accounts.owner)
            .await?;
        debug!(airline = %self.accounts.owner, %register_tx, "airline registration sent");
        let active = self.contract.is_airline(funder, funder).await?;
        info!(%funder, funds_wei = %funds_wei, active, "funding complete");

        Ok(FundReceipt {
            funds_wei,
            funder,
            active,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::contract::mock::{account, MockContract};

    async fn client(contract: &Arc<MockContract>) -> FlightSuretyClient<MockContract> {
        FlightSuretyClient::connect(contract.clone(), ClientConfig::default())
            .await
            .unwrap()
    }

    #[test]
    fn assigns_owner_airlines_and_passengers() {
        let accounts: Vec<Address> = (0..12).map(account).collect();
        let roles = ClientAccounts::from_accounts(&accounts).unwrap();
        assert_eq!(roles.owner, account(0));
        assert_eq!(roles.airlines, accounts[1..6].to_vec());
        assert_eq!(roles.passengers, accounts[6..11].to_vec());

        let short = ClientAccounts::from_accounts(&accounts[..1]).unwrap();
        assert!(matches!(short.first_airline(), Err(ClientError::NoAirline)));
        assert!(matches!(
            ClientAccounts::from_accounts(&[]),
            Err(ClientError::NoAccounts)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_before_timeout_wins() {
        let contract = Arc::new(MockContract::with_accounts(12));
        contract.state().resolve_with = Some((StatusCode::OnTime, Duration::from_millis(500)));
        let client = client(&contract).await;

        let started = Instant::now();
        let status = client.fetch_flight_status("ND1309").await.unwrap();
        assert_eq!(status, StatusCode::OnTime);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(client.is_fetched("ND1309"));

        let state = contract.state();
        assert_eq!(state.status_requests.len(), 1);
        let (from, airline, flight, _) = &state.status_requests[0];
        assert_eq!((*from, *airline, flight.as_str()), (account(0), account(1), "ND1309"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_resolution_times_out_once() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;

        let started = Instant::now();
        let err = client.fetch_flight_status("ND1309").await.unwrap_err();
        assert!(matches!(err, ClientError::ConsensusTimeout));
        assert_eq!(
            err.to_string(),
            "Oracles did not reach a consensus. Sorry! Please try again."
        );
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(!client.is_fetched("ND1309"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_resolution_is_ignored() {
        let contract = Arc::new(MockContract::with_accounts(12));
        contract.state().resolve_with = Some((StatusCode::LateWeather, Duration::from_secs(3)));
        let client = client(&contract).await;

        let err = client.fetch_flight_status("ND1309").await.unwrap_err();
        assert!(matches!(err, ClientError::ConsensusTimeout));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!client.is_fetched("ND1309"));
    }

    #[tokio::test(start_paused = true)]
    async fn resolutions_for_other_flights_do_not_count() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;

        let emitter = contract.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            emitter.emit_status(FlightStatusInfo {
                airline: account(1),
                flight: "AB0001".to_string(),
                timestamp: now_secs(),
                status: StatusCode::OnTime,
            });
        });

        let err = client.fetch_flight_status("ND1309").await.unwrap_err();
        assert!(matches!(err, ClientError::ConsensusTimeout));
        assert!(!client.is_fetched("AB0001"));
    }

    #[tokio::test]
    async fn rejects_empty_flight_and_surfaces_send_errors() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;
        assert!(matches!(
            client.fetch_flight_status("  ").await,
            Err(ClientError::EmptyFlight)
        ));

        contract.state().fetch_fails = true;
        assert!(matches!(
            client.fetch_flight_status("ND1309").await,
            Err(ClientError::Contract(ContractError::Rpc { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn claim_fetches_stale_status_first() {
        let contract = Arc::new(MockContract::with_accounts(12));
        contract.state().resolve_with = Some((StatusCode::LateAirline, Duration::from_millis(100)));
        let client = client(&contract).await;

        let receipt = client.claim_insurance("ND1309").await.unwrap();
        assert_eq!(receipt.refreshed_status, Some(StatusCode::LateAirline));

        let again = client.claim_insurance("ND1309").await.unwrap();
        assert_eq!(again.refreshed_status, None);

        let state = contract.state();
        assert_eq!(state.status_requests.len(), 1);
        assert_eq!(state.claims.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn claim_is_not_sent_without_consensus() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;

        assert!(matches!(
            client.claim_insurance("ND1309").await,
            Err(ClientError::ConsensusTimeout)
        ));
        assert!(contract.state().claims.is_empty());
    }

    #[tokio::test]
    async fn withdraw_resets_credit_and_repeats_are_noops() {
        let contract = Arc::new(MockContract::with_accounts(12));
        contract.state().credit = 1_500_000_000_000_000_000;
        let client = client(&contract).await;

        assert_eq!(client.withdraw().await.unwrap(), WithdrawOutcome::NothingToWithdraw);
        assert_eq!(contract.state().withdrawals, 0);

        assert_eq!(client.get_credit().await.unwrap(), 1_500_000_000_000_000_000);
        assert!(client.local_credit().can_withdraw());

        let outcome = client.withdraw().await.unwrap();
        assert!(matches!(
            outcome,
            WithdrawOutcome::Withdrawn {
                amount_wei: 1_500_000_000_000_000_000,
                ..
            }
        ));
        assert_eq!(client.local_credit().credit(), 0);

        for _ in 0..3 {
            assert_eq!(client.withdraw().await.unwrap(), WithdrawOutcome::NothingToWithdraw);
        }
        assert_eq!(contract.state().withdrawals, 1);
    }

    #[tokio::test]
    async fn failed_withdrawal_keeps_credit() {
        let contract = Arc::new(MockContract::with_accounts(12));
        {
            let mut state = contract.state();
            state.credit = 42;
            state.withdraw_fails = true;
        }
        let client = client(&contract).await;
        client.get_credit().await.unwrap();

        assert!(client.withdraw().await.is_err());
        assert_eq!(client.local_credit().credit(), 42);
    }

    #[tokio::test]
    async fn fund_reads_accounts_before_sending() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;

        let receipt = client.fund("10").await.unwrap();
        assert_eq!(
            receipt,
            FundReceipt {
                funds_wei: 10_000_000_000_000_000_000,
                funder: account(0),
                active: true,
            }
        );
        assert_eq!(
            contract.state().funded,
            vec![(account(0), 10_000_000_000_000_000_000)]
        );
    }

    #[tokio::test]
    async fn buys_insurance_in_wei_and_registers_flights() {
        let contract = Arc::new(MockContract::with_accounts(12));
        let client = client(&contract).await;

        let receipt = client.buy_insurance("ND1309", "0.5").await.unwrap();
        assert_eq!(receipt.amount_wei, 500_000_000_000_000_000);
        assert!(matches!(
            client.buy_insurance("ND1309", "lots").await,
            Err(ClientError::Units(_))
        ));

        client.register_flight("ND1309").await.unwrap();
        let state = contract.state();
        assert_eq!(state.purchases.len(), 1);
        assert_eq!(state.flights, vec![(account(1), "ND1309".to_string())]);
    }
}
