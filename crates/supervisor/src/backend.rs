use std::path::Path;

use async_trait::async_trait;
use fleetd_domain::{Network, ServiceKind};
use serde_json::{Map, Value};

use crate::error::SupervisorResult;

/// Everything a backend needs to bring its service up.
#[derive(Debug, Clone, Copy)]
pub struct LaunchContext<'a> {
    pub service: ServiceKind,
    pub network: Network,
    pub root_path: &'a Path,
    pub config_path: &'a Path,
}

/// What actually runs behind a managed service. Called with the service's
/// exclusive lock held, so implementations never see concurrent calls.
#[async_trait]
pub trait ServiceBackend: Send + Sync + 'static {
    /// Returns once the process or task has been spawned; does not wait for
    /// it to become healthy.
    async fn launch(&mut self, ctx: &LaunchContext<'_>) -> SupervisorResult<()>;

    /// Requests termination and waits at most a bounded grace period.
    async fn halt(&mut self) -> SupervisorResult<()>;

    /// Service-specific status fields. Must not perform I/O.
    fn extra_status(&self) -> Map<String, Value> {
        Map::new()
    }
}
