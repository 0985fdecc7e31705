use std::{fs, path::Path, sync::Arc};

use actix_web::{middleware::Logger, web, App, HttpServer};
use fleetd_domain::config::{ConfigError, DaemonConfig};
use fleetd_domain::services::{
    account::AccountStore,
    sdk::Sha3AccountSdk,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
};
use fleetd_domain::storage::{NodeConfigStore, StorageError};
use fleetd_domain::ServiceKind::{self, Ledger, PeerMap, Recorder};
use fleetd_monitor::{HttpLedgerApi, HttpRegistrar, ReporterError, RetryPolicy, HTTP_TIMEOUT};
use fleetd_storage::SeaOrmStorage;
use fleetd_supervisor::{
    Fleet, ManagedService, PeerMapBackend, ProcessBackend, Supervised, SupervisorError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    handlers::{
        create_account_handler, get_account_handler, get_config_handler, get_phrase_handler,
        info_handler, metrics_handler, recover_account_handler, save_account_handler,
        service_handler, update_config_handler,
    },
    state::{AppState, NodeInfo},
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = DaemonConfig::load_from_env()?;
    let telemetry = init_telemetry(&TelemetryConfig::from_env("FLEETD")?)?;

    prepare_directories(config.data_dir(), &config.db_dir())?;
    let storage = SeaOrmStorage::builder()
        .database_url(config.database_url())
        .build()
        .await?;
    let accounts = Arc::new(AccountStore::new(
        storage.clone(),
        Sha3AccountSdk,
        config.data_dir(),
    ));

    let fleet = Arc::new(build_fleet(&config)?);
    fleet.initialise_all(config.data_dir()).await?;

    match storage.current_network().await? {
        Some(network) => {
            match accounts.reconcile(network).await {
                Ok(outcome) => info!(%network, ?outcome, "seed sources checked"),
                Err(err) => warn!(%network, %err, "unable to reconcile seed sources"),
            }
            if let Err(err) = fleet.apply_network(network).await {
                warn!(%network, %err, "network not applied to every service");
            }
            if let Err(err) = fleet.get(PeerMap).start().await {
                warn!(%err, "peer map reporter did not start");
            }
        }
        None => info!("no network configured yet, services stay idle"),
    }

    let state = AppState::new(
        storage,
        accounts,
        Arc::clone(&fleet),
        telemetry,
        NodeInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            public_ip: config.public_ip().map(str::to_string),
            registrar_address: config.registrar_address().map(str::to_string),
        },
    );

    info!(address = %config.bind_address(), "control api listening");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind(config.bind_address())?
    .run();

    let served = server.await;
    info!("control api stopped, finalising services");
    fleet.finalise_all().await;
    served?;

    Ok(())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/api/info", web::get().to(info_handler))
        .route("/api/config", web::get().to(get_config_handler))
        .route("/api/config", web::post().to(update_config_handler))
        .route("/api/account", web::get().to(get_account_handler))
        .route("/api/account", web::post().to(create_account_handler))
        .route("/api/account/save", web::post().to(save_account_handler))
        .route("/api/account/phrase", web::get().to(get_phrase_handler))
        .route("/api/account/phrase", web::post().to(recover_account_handler))
        .route("/api/{service}", web::post().to(service_handler));
}

fn prepare_directories(data_dir: &Path, db_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(db_dir)?;
    for kind in [Ledger, Recorder, PeerMap] {
        fs::create_dir_all(data_dir.join(kind.dir_name()))?;
    }
    Ok(())
}

fn build_fleet(config: &DaemonConfig) -> Result<Fleet, ReporterError> {
    let ledger_api = HttpLedgerApi::new(config.ledger_api_url(), HTTP_TIMEOUT)?;
    let registrar = HttpRegistrar::new(config.registrar_address(), HTTP_TIMEOUT)?;

    Ok(Fleet::new(
        process_service(Ledger, config),
        process_service(Recorder, config),
        ManagedService::new(
            PeerMap,
            PeerMapBackend::new(
                Arc::new(ledger_api),
                Arc::new(registrar),
                config.registrar_address().map(str::to_string),
                RetryPolicy::from(config.reporter()),
            ),
        ),
    ))
}

fn process_service(kind: ServiceKind, config: &DaemonConfig) -> ManagedService<ProcessBackend> {
    let spec = match kind {
        Recorder => config.recorder().clone(),
        _ => config.ledger().clone(),
    };
    ManagedService::new(kind, ProcessBackend::new(kind, spec, config.stop_grace()))
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
    #[error("reporter client error: {0}")]
    Reporter(#[from] ReporterError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
