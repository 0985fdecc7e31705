use std::path::Path;

use async_trait::async_trait;
use fleetd_domain::{Network, ServiceKind};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::{LaunchContext, ServiceBackend};
use crate::error::{SupervisorError, SupervisorResult};
use crate::state::ServiceState;

/// Point-in-time view returned by [`Supervised::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: ServiceKind,
    pub started: bool,
    pub running: bool,
    pub network: Option<Network>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Object-safe lifecycle surface shared by every managed service.
#[async_trait]
pub trait Supervised: Send + Sync {
    fn kind(&self) -> ServiceKind;
    async fn initialise(&self, root_path: &Path) -> SupervisorResult<()>;
    async fn finalise(&self) -> SupervisorResult<()>;
    /// Stops the service first when it is running. Never starts it. When the
    /// stop fails the service keeps its previous network.
    async fn set_network(&self, network: Network) -> SupervisorResult<()>;
    async fn start(&self) -> SupervisorResult<()>;
    async fn stop(&self) -> SupervisorResult<()>;
    async fn status(&self) -> ServiceStatus;
}

struct Inner<B> {
    state: ServiceState,
    backend: B,
}

/// One supervised unit. Every transition holds the write lock for its whole
/// duration; `status` only takes the read lock.
pub struct ManagedService<B> {
    kind: ServiceKind,
    inner: RwLock<Inner<B>>,
}

impl<B: ServiceBackend> ManagedService<B> {
    pub fn new(kind: ServiceKind, backend: B) -> Self {
        Self {
            kind,
            inner: RwLock::new(Inner {
                state: ServiceState::default(),
                backend,
            }),
        }
    }

    /// Copy of the current lifecycle record.
    pub async fn state(&self) -> ServiceState {
        self.inner.read().await.state.clone()
    }

    fn record(&self, op: &'static str, result: &SupervisorResult<()>) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(
            "supervisor_transitions_total",
            "service" => self.kind.to_string(),
            "op" => op,
            "result" => outcome
        )
        .increment(1);
    }

    async fn start_locked(&self, inner: &mut Inner<B>) -> SupervisorResult<()> {
        let service = self.kind;
        if !inner.state.initialised {
            return Err(SupervisorError::NotInitialised { service });
        }
        if inner.state.running {
            return Err(SupervisorError::AlreadyRunning { service });
        }
        let (Some(network), Some(config_path)) =
            (inner.state.network, inner.state.config_path.clone())
        else {
            return Err(SupervisorError::NetworkNotSet { service });
        };

        let ctx = LaunchContext {
            service,
            network,
            root_path: &inner.state.root_path,
            config_path: &config_path,
        };
        inner.backend.launch(&ctx).await?;
        inner.state.running = true;
        info!(service = %service, network = %network, "service started");
        Ok(())
    }

    async fn stop_locked(&self, inner: &mut Inner<B>) -> SupervisorResult<()> {
        if !inner.state.running {
            return Err(SupervisorError::NotRunning { service: self.kind });
        }
        inner.backend.halt().await?;
        inner.state.running = false;
        info!(service = %self.kind, network = ?inner.state.network, "service stopped");
        Ok(())
    }
}

#[async_trait]
impl<B: ServiceBackend> Supervised for ManagedService<B> {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn initialise(&self, root_path: &Path) -> SupervisorResult<()> {
        let mut inner = self.inner.write().await;
        let result = if inner.state.initialised {
            Err(SupervisorError::AlreadyInitialised { service: self.kind })
        } else {
            inner.state.assign_root(self.kind, root_path);
            inner.state.running = false;
            inner.state.initialised = true;
            info!(service = %self.kind, root = %root_path.display(), "service initialised");
            Ok(())
        };
        self.record("initialise", &result);
        result
    }

    async fn finalise(&self) -> SupervisorResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.state.initialised {
            let result = Err(SupervisorError::NotInitialised { service: self.kind });
            self.record("finalise", &result);
            return result;
        }

        if inner.state.running {
            warn!(service = %self.kind, "finalising a running service, stopping it first");
            if let Err(err) = inner.backend.halt().await {
                warn!(service = %self.kind, %err, "stop during finalise failed");
                let result = Err(err);
                self.record("finalise", &result);
                return result;
            }
            inner.state.running = false;
        }
        inner.state.initialised = false;
        info!(service = %self.kind, "service finalised");
        self.record("finalise", &Ok(()));
        Ok(())
    }

    async fn set_network(&self, network: Network) -> SupervisorResult<()> {
        let mut inner = self.inner.write().await;
        if inner.state.running {
            info!(service = %self.kind, %network, "stopping service before network switch");
            if let Err(err) = self.stop_locked(&mut inner).await {
                warn!(service = %self.kind, %err, "stop before network switch failed");
                let result = Err(err);
                self.record("set_network", &result);
                return result;
            }
        }
        inner.state.assign_network(self.kind, network);
        info!(service = %self.kind, %network, "network assigned");
        self.record("set_network", &Ok(()));
        Ok(())
    }

    async fn start(&self) -> SupervisorResult<()> {
        let mut inner = self.inner.write().await;
        let result = self.start_locked(&mut inner).await;
        if let Err(err) = &result {
            warn!(service = %self.kind, %err, "start failed");
        }
        self.record("start", &result);
        result
    }

    async fn stop(&self) -> SupervisorResult<()> {
        let mut inner = self.inner.write().await;
        let result = self.stop_locked(&mut inner).await;
        if let Err(err) = &result {
            warn!(service = %self.kind, %err, "stop failed");
        }
        self.record("stop", &result);
        result
    }

    async fn status(&self) -> ServiceStatus {
        let inner = self.inner.read().await;
        ServiceStatus {
            service: self.kind,
            started: inner.state.running,
            running: inner.state.running,
            network: inner.state.network,
            extra: inner.backend.extra_status(),
        }
    }
}
