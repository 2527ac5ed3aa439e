//! FlightSurety Oracle Server
//!
//! Registers a pool of simulated oracles with the FlightSurety app contract,
//! answers `OracleRequest` events with flight status reports and serves a
//! small HTTP API for the dApp.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tokio::time::sleep;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flightsurety_server::app_state::AppState;
use flightsurety_server::config::{ContractsConfig, OracleConfig};
use flightsurety_server::contract::RpcContract;
use flightsurety_server::routes;
use flightsurety_server::services::{restart_backoff, OraclePool, OracleResponder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_state = AppState::new();

    // Start and supervise the oracle responder.
    match (ContractsConfig::from_env(), OracleConfig::from_env()) {
        (Ok(contracts), Ok(oracles)) => match RpcContract::new(contracts) {
            Ok(contract) => {
                tokio::spawn(run_oracles(Arc::new(contract), oracles, app_state.clone()));
            }
            Err(err) => error!(error = %err, "oracle responder disabled: contract ABI unavailable"),
        },
        (Err(err), _) | (_, Err(err)) => {
            error!(error = %err, "oracle responder disabled: invalid configuration");
        }
    }

    let app = routes::app(app_state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_oracles(contract: Arc<RpcContract>, config: OracleConfig, app_state: AppState) {
    let pool = match OraclePool::bootstrap(contract.as_ref(), &config).await {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "oracle bootstrap failed; no oracles will respond");
            return;
        }
    };
    app_state.set_oracle_pool(pool.clone()).await;

    let responder = Arc::new(OracleResponder::new(contract, pool, config.status_policy));
    let mut restart_count: u32 = 0;
    loop {
        let listener = responder.clone();
        let handle = tokio::spawn(async move { listener.listen().await });

        match handle.await {
            Ok(err) => warn!(error = %err, "oracle request subscription ended; resubscribing"),
            Err(join_error) => {
                if join_error.is_panic() {
                    error!("oracle responder panicked; restarting");
                } else {
                    error!(error = %join_error, "oracle responder task failed; restarting");
                }
            }
        }

        restart_count = restart_count.saturating_add(1);
        let backoff = restart_backoff(restart_count);
        warn!(restart_count, backoff_seconds = backoff.as_secs(), "oracle responder restart backoff");
        sleep(backoff).await;
    }
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:8000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
