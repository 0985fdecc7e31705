//! Environment-driven configuration shared by the daemon binary and its
//! embedded services.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:9980";
const DEFAULT_LEDGER_API_URL: &str = "https://127.0.0.1:2131/bitmarkd";
const DEFAULT_LEDGER_BIN: &str = "bitmarkd";
const DEFAULT_RECORDER_BIN: &str = "recorderd";
const DEFAULT_STOP_GRACE_SECS: u64 = 5;
const DEFAULT_REPORTER_INTERVAL_SECS: u64 = 3;
const DEFAULT_REPORTER_MAX_BACKOFF_SECS: u64 = 30;
const DEFAULT_REPORTER_DEGRADED_AFTER: u32 = 5;

/// Program plus leading arguments used to launch a supervised daemon. The
/// supervisor appends `--config-file <path>` when spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Peer-map reporter pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterSettings {
    pub interval: Duration,
    pub max_backoff: Duration,
    pub degraded_after: u32,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REPORTER_INTERVAL_SECS),
            max_backoff: Duration::from_secs(DEFAULT_REPORTER_MAX_BACKOFF_SECS),
            degraded_after: DEFAULT_REPORTER_DEGRADED_AFTER,
        }
    }
}

/// Everything the orchestrator needs to build the fleet, resolved from
/// `.env`/process variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    data_dir: PathBuf,
    bind_address: String,
    ledger: ProcessSpec,
    recorder: ProcessSpec,
    ledger_api_url: String,
    registrar_address: Option<String>,
    public_ip: Option<String>,
    stop_grace: Duration,
    reporter: ReporterSettings,
}

impl DaemonConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// process variables. Only `FLEETD_DATA_DIR` is required; malformed
    /// numbers surface as `ConfigError`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let data_dir = PathBuf::from(get_required_var("FLEETD_DATA_DIR")?);
        let ledger = ProcessSpec::new(
            get_optional_var("FLEETD_LEDGER_BIN").unwrap_or_else(|| DEFAULT_LEDGER_BIN.into()),
            split_args(get_optional_var("FLEETD_LEDGER_ARGS")),
        );
        let recorder = ProcessSpec::new(
            get_optional_var("FLEETD_RECORDER_BIN")
                .unwrap_or_else(|| DEFAULT_RECORDER_BIN.into()),
            split_args(get_optional_var("FLEETD_RECORDER_ARGS")),
        );

        let interval_secs =
            get_number_var("PEERMAP_INTERVAL_SECS", DEFAULT_REPORTER_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::ZeroValue {
                key: "PEERMAP_INTERVAL_SECS",
            });
        }
        let reporter = ReporterSettings {
            interval: Duration::from_secs(interval_secs),
            max_backoff: Duration::from_secs(get_number_var(
                "PEERMAP_MAX_BACKOFF_SECS",
                DEFAULT_REPORTER_MAX_BACKOFF_SECS,
            )?),
            degraded_after: get_number_var(
                "PEERMAP_DEGRADED_AFTER",
                DEFAULT_REPORTER_DEGRADED_AFTER,
            )?,
        };

        Ok(Self {
            data_dir,
            bind_address: get_optional_var("FLEETD_BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into()),
            ledger,
            recorder,
            ledger_api_url: get_optional_var("FLEETD_LEDGER_API_URL")
                .unwrap_or_else(|| DEFAULT_LEDGER_API_URL.into()),
            registrar_address: get_optional_var("MAP_IP_PORT"),
            public_ip: get_optional_var("PUBLIC_IP"),
            stop_grace: Duration::from_secs(get_number_var(
                "FLEETD_STOP_GRACE_SECS",
                DEFAULT_STOP_GRACE_SECS,
            )?),
            reporter,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the embedded key-value store.
    pub fn db_dir(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    /// SQLite URL of the embedded key-value store.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_dir().join("fleetd.sqlite").display())
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn ledger(&self) -> &ProcessSpec {
        &self.ledger
    }

    pub fn recorder(&self) -> &ProcessSpec {
        &self.recorder
    }

    pub fn ledger_api_url(&self) -> &str {
        &self.ledger_api_url
    }

    pub fn registrar_address(&self) -> Option<&str> {
        self.registrar_address.as_deref()
    }

    pub fn public_ip(&self) -> Option<&str> {
        self.public_ip.as_deref()
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    pub fn reporter(&self) -> ReporterSettings {
        self.reporter
    }
}

fn split_args(raw: Option<String>) -> Vec<String> {
    raw.map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("FLEETD_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` must be greater than zero")]
    ZeroValue { key: &'static str },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const OPTIONAL_KEYS: &[&str] = &[
        "FLEETD_BIND_ADDRESS",
        "FLEETD_LEDGER_BIN",
        "FLEETD_LEDGER_ARGS",
        "FLEETD_RECORDER_BIN",
        "FLEETD_RECORDER_ARGS",
        "FLEETD_LEDGER_API_URL",
        "FLEETD_STOP_GRACE_SECS",
        "MAP_IP_PORT",
        "PUBLIC_IP",
        "PEERMAP_INTERVAL_SECS",
        "PEERMAP_MAX_BACKOFF_SECS",
        "PEERMAP_DEGRADED_AFTER",
    ];

    fn set_env() {
        std::env::set_var("FLEETD_SKIP_DOTENV", "1");
        std::env::set_var("FLEETD_DATA_DIR", "/var/lib/fleetd");
        for key in OPTIONAL_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_apply_when_only_data_dir_is_set() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = DaemonConfig::load_from_env().expect("config loads");
        assert_eq!(config.data_dir(), Path::new("/var/lib/fleetd"));
        assert_eq!(config.bind_address(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.ledger().program, "bitmarkd");
        assert!(config.ledger().args.is_empty());
        assert_eq!(config.ledger_api_url(), DEFAULT_LEDGER_API_URL);
        assert_eq!(config.registrar_address(), None);
        assert_eq!(config.stop_grace(), Duration::from_secs(5));
        assert_eq!(config.reporter(), ReporterSettings::default());
        assert_eq!(
            config.database_url(),
            "sqlite:///var/lib/fleetd/db/fleetd.sqlite?mode=rwc"
        );
    }

    #[test]
    fn reads_overrides_and_splits_args() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("FLEETD_LEDGER_BIN", "/opt/bin/bitmarkd");
        std::env::set_var("FLEETD_LEDGER_ARGS", "  --quiet   --foreground ");
        std::env::set_var("MAP_IP_PORT", " 10.1.1.1:8080 ");
        std::env::set_var("PEERMAP_INTERVAL_SECS", "7");
        std::env::set_var("PEERMAP_DEGRADED_AFTER", "2");

        let config = DaemonConfig::load_from_env().expect("config loads");
        assert_eq!(config.ledger().program, "/opt/bin/bitmarkd");
        assert_eq!(config.ledger().args, vec!["--quiet", "--foreground"]);
        assert_eq!(config.registrar_address(), Some("10.1.1.1:8080"));
        assert_eq!(config.reporter().interval, Duration::from_secs(7));
        assert_eq!(config.reporter().degraded_after, 2);

        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("FLEETD_DATA_DIR", "   ");

        let err = DaemonConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "FLEETD_DATA_DIR"
            }
        ));

        set_env();
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("FLEETD_STOP_GRACE_SECS", "soon");

        let err = DaemonConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "FLEETD_STOP_GRACE_SECS",
                ..
            }
        ));

        set_env();
    }

    #[test]
    fn zero_reporter_interval_is_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("PEERMAP_INTERVAL_SECS", "0");

        let err = DaemonConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroValue {
                key: "PEERMAP_INTERVAL_SECS"
            }
        ));

        set_env();
    }
}
