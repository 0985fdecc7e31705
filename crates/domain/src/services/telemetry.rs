//! Process-wide tracing and Prometheus wiring.
//!
//! Both the `fleetd` daemon and the standalone reporter call
//! [`init_telemetry`] once at boot. The recorder handle is kept so the control
//! API can render `/metrics` without a separate listener.

use std::{env, net::SocketAddr, sync::Arc};

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

const DEFAULT_LOG_FILTER: &str = "info";

static TELEMETRY: OnceCell<TelemetryGuard> = OnceCell::new();

/// Observability knobs read from `<PREFIX>_LOG_FILTER` and
/// `<PREFIX>_METRICS_ADDRESS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    log_filter: String,
    metrics_address: Option<SocketAddr>,
}

impl TelemetryConfig {
    /// Missing or blank variables fall back to defaults; a metrics address
    /// that does not parse is rejected here rather than at install time.
    pub fn from_env(prefix: &str) -> Result<Self, TelemetryError> {
        let _ = hydrate_env_file();
        let prefix = prefix.trim().to_ascii_uppercase();

        let log_filter = read_var(&format!("{prefix}_LOG_FILTER"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let metrics_address = read_var(&format!("{prefix}_METRICS_ADDRESS"))
            .map(|raw| {
                raw.parse::<SocketAddr>()
                    .map_err(|err| TelemetryError::InvalidMetricsAddress(raw, err.to_string()))
            })
            .transpose()?;

        Ok(Self {
            log_filter,
            metrics_address,
        })
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn metrics_address(&self) -> Option<SocketAddr> {
        self.metrics_address
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            metrics_address: None,
        }
    }
}

fn read_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}

/// Installs the tracing subscriber and the metrics recorder. Later calls
/// return the guard from the first successful call and ignore `config`.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    TELEMETRY
        .get_or_try_init(|| {
            let filter = EnvFilter::try_new(config.log_filter())
                .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init()
                .map_err(|err| TelemetryError::Tracing(err.to_string()))?;

            let handle = install_recorder(config.metrics_address())?;
            describe_metrics();

            Ok(TelemetryGuard {
                metrics: Arc::new(handle),
            })
        })
        .cloned()
}

/// Without an address the recorder is only rendered on demand. With one, the
/// exporter's own listener is spawned on the current tokio runtime.
fn install_recorder(address: Option<SocketAddr>) -> Result<PrometheusHandle, TelemetryError> {
    let Some(addr) = address else {
        return PrometheusBuilder::new()
            .install_recorder()
            .map_err(|err| TelemetryError::Metrics(err.to_string()));
    };

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| TelemetryError::Metrics("metrics listener needs a tokio runtime".into()))?;
    let _entered = runtime.enter();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|err| TelemetryError::Metrics(err.to_string()))?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| TelemetryError::Metrics("a metrics recorder is already installed".into()))?;
    runtime.spawn(exporter);
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(
        "supervisor_transitions_total",
        "Lifecycle transitions per service, operation and outcome"
    );
    describe_counter!(
        "peermap_cycles_total",
        "Peer-map reporter cycles by outcome"
    );
    describe_counter!(
        "peermap_registrations_total",
        "Per-peer registrar posts by outcome"
    );
    describe_gauge!(
        "peermap_consecutive_failures",
        "Failed reporter cycles since the last success"
    );
    describe_counter!(
        "account_resolutions_total",
        "Account resolutions by the source that answered"
    );
    describe_counter!(
        "api_service_requests_total",
        "Control API service requests by service and option"
    );
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("invalid metrics address `{0}`: {1}")]
    InvalidMetricsAddress(String, String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
