use std::sync::Arc;

use fleetd_domain::services::{
    account::AccountStore, sdk::Sha3AccountSdk, telemetry::TelemetryGuard,
};
use fleetd_storage::SeaOrmStorage;
use fleetd_supervisor::Fleet;

pub type Accounts = AccountStore<SeaOrmStorage, Sha3AccountSdk>;

#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub version: String,
    pub public_ip: Option<String>,
    pub registrar_address: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    accounts: Arc<Accounts>,
    fleet: Arc<Fleet>,
    telemetry: TelemetryGuard,
    info: Arc<NodeInfo>,
}

impl AppState {
    pub fn new(
        storage: SeaOrmStorage,
        accounts: Arc<Accounts>,
        fleet: Arc<Fleet>,
        telemetry: TelemetryGuard,
        info: NodeInfo,
    ) -> Self {
        Self {
            storage,
            accounts,
            fleet,
            telemetry,
            info: Arc::new(info),
        }
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    pub fn accounts(&self) -> &Accounts {
        self.accounts.as_ref()
    }

    pub fn fleet(&self) -> &Fleet {
        self.fleet.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn info(&self) -> &NodeInfo {
        self.info.as_ref()
    }
}
