use std::path::Path;

use fleetd_domain::{Network, ServiceKind};
use tracing::{info, warn};

use crate::error::SupervisorResult;
use crate::service::{ServiceStatus, Supervised};

/// The three managed services, addressed by [`ServiceKind`].
pub struct Fleet {
    ledger: Box<dyn Supervised>,
    recorder: Box<dyn Supervised>,
    peer_map: Box<dyn Supervised>,
}

impl Fleet {
    pub fn new(
        ledger: impl Supervised + 'static,
        recorder: impl Supervised + 'static,
        peer_map: impl Supervised + 'static,
    ) -> Self {
        Self {
            ledger: Box::new(ledger),
            recorder: Box::new(recorder),
            peer_map: Box::new(peer_map),
        }
    }

    pub fn get(&self, kind: ServiceKind) -> &dyn Supervised {
        match kind {
            ServiceKind::Ledger => self.ledger.as_ref(),
            ServiceKind::Recorder => self.recorder.as_ref(),
            ServiceKind::PeerMap => self.peer_map.as_ref(),
        }
    }

    pub fn services(&self) -> [&dyn Supervised; 3] {
        [
            self.ledger.as_ref(),
            self.recorder.as_ref(),
            self.peer_map.as_ref(),
        ]
    }

    /// Initialises every service with its own directory below `data_root`.
    pub async fn initialise_all(&self, data_root: &Path) -> SupervisorResult<()> {
        for service in self.services() {
            let root = data_root.join(service.kind().dir_name());
            service.initialise(&root).await?;
        }
        Ok(())
    }

    /// Switches every service to `network`. Running services are stopped;
    /// none are restarted. Every service is attempted; the first failure is
    /// returned and that service keeps its old network.
    pub async fn apply_network(&self, network: Network) -> SupervisorResult<()> {
        let mut first_error = None;
        for service in self.services() {
            if let Err(err) = service.set_network(network).await {
                warn!(service = %service.kind(), %network, %err, "network switch failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                info!(%network, "network applied to fleet");
                Ok(())
            }
        }
    }

    /// Finalises every service, stopping the ones still running. Failures
    /// are logged so one service cannot keep the others alive.
    pub async fn finalise_all(&self) {
        for service in self.services() {
            if let Err(err) = service.finalise().await {
                warn!(service = %service.kind(), %err, "finalise failed");
            }
        }
    }

    pub async fn statuses(&self) -> Vec<ServiceStatus> {
        let mut statuses = Vec::with_capacity(3);
        for service in self.services() {
            statuses.push(service.status().await);
        }
        statuses
    }
}
