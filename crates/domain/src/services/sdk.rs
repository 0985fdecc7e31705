//! Seam to the account SDK that derives identities from seed material.
//!
//! The supervisor only ever handles opaque seed strings and account numbers;
//! the algorithms behind them live behind [`AccountSdk`]. [`Sha3AccountSdk`]
//! is the bundled implementation used by the daemon binary.

use bip39::Mnemonic;
use hex::{decode as hex_decode, encode as hex_encode};
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use crate::model::{Account, Network};

/// Number of entropy bytes behind every seed.
pub const SEED_ENTROPY_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
    #[error("invalid recovery phrase: {0}")]
    InvalidPhrase(String),
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

pub trait AccountSdk: Send + Sync {
    /// Derives the public account number from a seed.
    fn account_from_seed(&self, seed: &str) -> Result<String, SdkError>;

    /// Generates a fresh account for `network`.
    fn new_account(&self, network: Network) -> Result<Account, SdkError>;

    /// Space-separated recovery phrase for a seed.
    fn recovery_phrase(&self, seed: &str) -> Result<String, SdkError>;

    /// Rebuilds the account behind a recovery phrase for `network`.
    fn account_from_recovery_phrase(
        &self,
        phrase: &str,
        network: Network,
    ) -> Result<Account, SdkError>;
}

/// Seeds are `<tag><64 hex chars>` where the tag binds the seed to its
/// network; account numbers are the SHA3-256 fingerprint of tag + entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha3AccountSdk;

impl Sha3AccountSdk {
    fn tag(network: Network) -> char {
        match network {
            Network::Bitmark => 'L',
            Network::Testing => 'T',
        }
    }

    fn encode_seed(network: Network, entropy: &[u8]) -> String {
        format!("{}{}", Self::tag(network), hex_encode(entropy))
    }

    fn decode_seed(seed: &str) -> Result<(Network, Vec<u8>), SdkError> {
        let mut chars = seed.chars();
        let network = match chars.next() {
            Some('L') => Network::Bitmark,
            Some('T') => Network::Testing,
            _ => return Err(SdkError::InvalidSeed("unknown network tag".into())),
        };
        let entropy =
            hex_decode(chars.as_str()).map_err(|err| SdkError::InvalidSeed(err.to_string()))?;
        if entropy.len() != SEED_ENTROPY_LEN {
            return Err(SdkError::InvalidSeed(format!(
                "expected {SEED_ENTROPY_LEN} bytes of entropy, got {}",
                entropy.len()
            )));
        }
        Ok((network, entropy))
    }

    fn fingerprint(network: Network, entropy: &[u8]) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update([Self::tag(network) as u8]);
        hasher.update(entropy);
        hex_encode(hasher.finalize())
    }

    fn account_from_entropy(network: Network, entropy: &[u8]) -> Account {
        Account::new(
            Self::fingerprint(network, entropy),
            Self::encode_seed(network, entropy),
        )
    }
}

impl AccountSdk for Sha3AccountSdk {
    fn account_from_seed(&self, seed: &str) -> Result<String, SdkError> {
        let (network, entropy) = Self::decode_seed(seed.trim())?;
        Ok(Self::fingerprint(network, &entropy))
    }

    fn new_account(&self, network: Network) -> Result<Account, SdkError> {
        let mut entropy = [0u8; SEED_ENTROPY_LEN];
        getrandom::fill(&mut entropy).map_err(|err| SdkError::Entropy(err.to_string()))?;
        Ok(Self::account_from_entropy(network, &entropy))
    }

    fn recovery_phrase(&self, seed: &str) -> Result<String, SdkError> {
        let (_, entropy) = Self::decode_seed(seed.trim())?;
        let mnemonic =
            Mnemonic::from_entropy(&entropy).map_err(|err| SdkError::InvalidSeed(err.to_string()))?;
        Ok(mnemonic.to_string())
    }

    fn account_from_recovery_phrase(
        &self,
        phrase: &str,
        network: Network,
    ) -> Result<Account, SdkError> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse(normalized.as_str())
            .map_err(|err| SdkError::InvalidPhrase(err.to_string()))?;
        let entropy = mnemonic.to_entropy();
        if entropy.len() != SEED_ENTROPY_LEN {
            return Err(SdkError::InvalidPhrase(format!(
                "expected a {}-word phrase",
                SEED_ENTROPY_LEN * 3 / 4
            )));
        }
        Ok(Self::account_from_entropy(network, &entropy))
    }
}
