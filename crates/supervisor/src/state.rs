use std::path::{Path, PathBuf};

use fleetd_domain::{Network, ServiceKind};

/// Shared lifecycle record. Always accessed through the owning
/// [`crate::ManagedService`]'s lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceState {
    pub initialised: bool,
    pub running: bool,
    pub network: Option<Network>,
    pub root_path: PathBuf,
    /// Only `Some` while a network is set.
    pub config_path: Option<PathBuf>,
}

impl ServiceState {
    pub fn assign_network(&mut self, kind: ServiceKind, network: Network) {
        self.network = Some(network);
        self.config_path = Some(kind.config_path(&self.root_path, network));
    }

    pub fn assign_root(&mut self, kind: ServiceKind, root_path: &Path) {
        self.root_path = root_path.to_path_buf();
        self.config_path = self
            .network
            .map(|network| kind.config_path(&self.root_path, network));
    }
}
