use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleetd_domain::config::ReporterSettings;
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    pipeline::{publish_peers, PublishSummary},
    registrar::Registrar,
    rpc::LedgerApi,
};

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("registrar address is not configured")]
    NoRegistrar,
}

impl From<reqwest::Error> for ReporterError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_delay: Duration,
    pub degraded_after: u32,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_delay: interval,
            degraded_after: u32::MAX,
        }
    }

    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        let factor = 1u32 << consecutive_failures.min(16);
        self.interval
            .saturating_mul(factor)
            .min(self.max_delay.max(self.interval))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ReporterSettings::default().into()
    }
}

impl From<ReporterSettings> for RetryPolicy {
    fn from(settings: ReporterSettings) -> Self {
        Self {
            interval: settings.interval,
            max_delay: settings.max_backoff,
            degraded_after: settings.degraded_after,
        }
    }
}

#[derive(Debug)]
pub struct ReporterHealth {
    degraded_after: u32,
    consecutive_failures: AtomicU32,
    cycles_completed: AtomicU64,
    peers_published: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub consecutive_failures: u32,
    pub degraded: bool,
    pub cycles_completed: u64,
    pub peers_published: u64,
}

impl ReporterHealth {
    pub fn new(degraded_after: u32) -> Self {
        Self {
            degraded_after: degraded_after.max(1),
            consecutive_failures: AtomicU32::new(0),
            cycles_completed: AtomicU64::new(0),
            peers_published: AtomicU64::new(0),
        }
    }

    fn record_success(&self, summary: &PublishSummary) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.peers_published
            .fetch_add(summary.published as u64, Ordering::SeqCst);
    }

    fn record_failure(&self) -> u32 {
        self.consecutive_failures
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let consecutive_failures = self.consecutive_failures.load(Ordering::SeqCst);
        HealthSnapshot {
            consecutive_failures,
            degraded: consecutive_failures >= self.degraded_after,
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            peers_published: self.peers_published.load(Ordering::SeqCst),
        }
    }
}

impl Default for ReporterHealth {
    fn default() -> Self {
        Self::new(RetryPolicy::default().degraded_after)
    }
}

pub async fn run_cycle<L, R>(ledger: &L, registrar: &R) -> Result<PublishSummary, ReporterError>
where
    L: LedgerApi + ?Sized,
    R: Registrar + ?Sized,
{
    let details = ledger.details().await?;
    let peers = ledger.peers().await?;
    Ok(publish_peers(registrar, &details, &peers).await)
}

/// Runs cycles until `cancel` fires. Cancellation is raced against both the
/// inter-cycle sleep and the in-flight cycle, so shutdown never waits for an
/// HTTP timeout.
pub async fn run_reporter(
    ledger: Arc<dyn LedgerApi>,
    registrar: Arc<dyn Registrar>,
    policy: RetryPolicy,
    health: Arc<ReporterHealth>,
    cancel: CancellationToken,
) {
    let mut delay = policy.interval;
    info!(interval = ?policy.interval, "peer map reporter started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(delay) => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = run_cycle(ledger.as_ref(), registrar.as_ref()) => outcome,
        };

        match outcome {
            Ok(summary) => {
                counter!("peermap_cycles_total", "result" => "ok").increment(1);
                health.record_success(&summary);
                gauge!("peermap_consecutive_failures").set(0.0);
                debug!(?summary, "peer map cycle complete");
                delay = policy.interval;
            }
            Err(err) => {
                counter!("peermap_cycles_total", "result" => "error").increment(1);
                let failures = health.record_failure();
                gauge!("peermap_consecutive_failures").set(failures as f64);
                delay = policy.delay_after(failures);
                if failures == policy.degraded_after {
                    warn!(failures, "peer map reporter degraded");
                }
                warn!(?err, failures, retry_in = ?delay, "unable to query ledger api, retrying");
            }
        }
    }

    info!("peer map reporter stopped");
}
