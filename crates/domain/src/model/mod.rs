//! Data structures shared across the supervisor, reporter and API crates.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// File name of the seed file inside the ledger's per-network directory.
pub const SEED_FILE_NAME: &str = "proof.sign";

/// Named deployment environment. Scopes configuration files, data
/// directories and stored seeds; seeds for different networks never collide.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    Bitmark,
    Testing,
}

impl Network {
    /// Parses a user or store supplied network name. Surrounding whitespace
    /// is ignored; anything outside the known set is rejected.
    pub fn parse(value: &str) -> Result<Self, UnknownNetwork> {
        value
            .trim()
            .parse()
            .map_err(|_| UnknownNetwork(value.trim().to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown network `{0}`")]
pub struct UnknownNetwork(pub String);

/// The three supervised units.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceKind {
    /// Consensus/ledger daemon (child process).
    Ledger,
    /// Proof-of-work recorder paired with the ledger (child process).
    Recorder,
    /// Peer-map reporter; runs in-process instead of as a child.
    PeerMap,
}

impl ServiceKind {
    /// Directory name under the data root, also used for config file names.
    pub fn dir_name(self) -> &'static str {
        match self {
            ServiceKind::Ledger => "bitmarkd",
            ServiceKind::Recorder => "recorderd",
            ServiceKind::PeerMap => "mapd",
        }
    }

    /// Accepts either the service name or its directory name, so both
    /// `peermap` and `mapd` resolve to [`ServiceKind::PeerMap`].
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::iter().find(|kind| kind.as_ref() == name || kind.dir_name() == name)
    }

    /// `<root>/<network>/<service>.conf`
    pub fn config_path(self, root: &Path, network: Network) -> PathBuf {
        root.join(network.as_ref())
            .join(format!("{}.conf", self.dir_name()))
    }
}

/// Location of the seed file for `network` below the data root.
pub fn seed_file_path(data_root: &Path, network: Network) -> PathBuf {
    data_root
        .join(ServiceKind::Ledger.dir_name())
        .join(network.as_ref())
        .join(SEED_FILE_NAME)
}

/// An account number paired with the secret seed it was derived from.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub account_number: String,
    pub seed: String,
}

impl Account {
    pub fn new(account_number: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            seed: seed.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_number", &self.account_number)
            .field("seed", &"<redacted>")
            .finish()
    }
}
