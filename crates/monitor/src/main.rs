use std::io;
use std::sync::Arc;

use fleetd_domain::config::{ConfigError, DaemonConfig};
use fleetd_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use fleetd_monitor::{
    run_reporter, HttpLedgerApi, HttpRegistrar, ReporterError, ReporterHealth, RetryPolicy,
    HTTP_TIMEOUT,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum PeermapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Client(#[from] ReporterError),
}

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[peermap] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), PeermapError> {
    let config = DaemonConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("PEERMAP")?;
    init_telemetry(&telemetry_config)?;

    if config.registrar_address().is_none() {
        warn!("MAP_IP_PORT is not set, every registration will fail");
    }

    let ledger = Arc::new(HttpLedgerApi::new(config.ledger_api_url(), HTTP_TIMEOUT)?);
    let registrar = Arc::new(HttpRegistrar::new(config.registrar_address(), HTTP_TIMEOUT)?);
    let policy = RetryPolicy::from(config.reporter());
    let health = Arc::new(ReporterHealth::new(policy.degraded_after));
    let cancel = CancellationToken::new();

    let reporter = tokio::spawn(run_reporter(
        ledger,
        registrar,
        policy,
        health,
        cancel.clone(),
    ));

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "unable to listen for ctrl-c, stopping");
    }
    info!("interrupt received, stopping reporter");
    cancel.cancel();
    if let Err(err) = reporter.await {
        warn!(?err, "reporter task ended abnormally");
    }

    Ok(())
}
