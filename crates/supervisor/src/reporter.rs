use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetd_monitor::{run_reporter, LedgerApi, Registrar, ReporterHealth, RetryPolicy};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{LaunchContext, ServiceBackend};
use crate::error::SupervisorResult;

const JOIN_WAIT: Duration = Duration::from_secs(2);

struct RunningReporter {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Backend of the peer-map service. "Launching" spawns the reporter loop as
/// a tokio task; halting cancels it.
pub struct PeerMapBackend {
    ledger: Arc<dyn LedgerApi>,
    registrar: Arc<dyn Registrar>,
    registrar_address: Option<String>,
    policy: RetryPolicy,
    health: Arc<ReporterHealth>,
    task: Option<RunningReporter>,
}

impl PeerMapBackend {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        registrar: Arc<dyn Registrar>,
        registrar_address: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            registrar,
            registrar_address,
            health: Arc::new(ReporterHealth::new(policy.degraded_after)),
            policy,
            task: None,
        }
    }

    pub fn health(&self) -> Arc<ReporterHealth> {
        Arc::clone(&self.health)
    }
}

#[async_trait]
impl ServiceBackend for PeerMapBackend {
    async fn launch(&mut self, ctx: &LaunchContext<'_>) -> SupervisorResult<()> {
        if self.registrar_address.is_none() {
            warn!(service = %ctx.service, "MAP_IP_PORT is not set, registrations will fail");
        }

        self.health = Arc::new(ReporterHealth::new(self.policy.degraded_after));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_reporter(
            Arc::clone(&self.ledger),
            Arc::clone(&self.registrar),
            self.policy,
            Arc::clone(&self.health),
            cancel.clone(),
        ));
        info!(service = %ctx.service, network = %ctx.network, "reporter task spawned");
        self.task = Some(RunningReporter { cancel, handle });
        Ok(())
    }

    async fn halt(&mut self) -> SupervisorResult<()> {
        let Some(RunningReporter { cancel, mut handle }) = self.task.take() else {
            return Ok(());
        };
        cancel.cancel();
        if timeout(JOIN_WAIT, &mut handle).await.is_err() {
            warn!("reporter did not observe cancellation in time, aborting");
            handle.abort();
        }
        Ok(())
    }

    fn extra_status(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert(
            "ipPort".into(),
            Value::from(self.registrar_address.clone().unwrap_or_default()),
        );
        let snapshot = self.health.snapshot();
        extra.insert(
            "consecutiveFailures".into(),
            Value::from(snapshot.consecutive_failures),
        );
        extra.insert("degraded".into(), Value::from(snapshot.degraded));
        extra.insert(
            "cyclesCompleted".into(),
            Value::from(snapshot.cycles_completed),
        );
        extra.insert(
            "peersPublished".into(),
            Value::from(snapshot.peers_published),
        );
        extra
    }
}
