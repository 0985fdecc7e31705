//! Load-or-create resolution of the node's account across the in-memory
//! cache, the embedded key-value store and the seed file.
//!
//! Precedence at read time is cache, then store, then file. Writes go to the
//! store first and are then mirrored into the file, so the store is the
//! write-ahead source and the file is always reproducible from it.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use metrics::counter;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::{seed_file_path, Account, Network};
use crate::services::sdk::{AccountSdk, SdkError};
use crate::storage::{SeedStore, StorageError};

const SEED_PREFIX: &str = "SEED:";

/// Where a resolved seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SeedSource {
    Cache,
    Store,
    File,
}

/// Result of [`AccountStore::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Neither the store nor the file holds a seed.
    Empty,
    /// Store and file agree.
    InSync,
    /// The file was missing or diverged and has been rewritten from the store.
    FileRewritten,
    /// Only the file held a seed; it has been written into the store.
    StoreAdopted,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no seed found for network `{0}`")]
    NotFound(Network),
    #[error("an account already exists for network `{0}`")]
    AlreadyExists(Network),
    #[error("corrupt seed material in {location}: {reason}")]
    Corrupt { location: SeedSource, reason: String },
    #[error("account number does not match its seed")]
    Mismatch,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("seed file error: {0}")]
    Io(#[from] io::Error),
    #[error("account sdk error: {0}")]
    Sdk(#[from] SdkError),
}

/// Owns the seed material for every network.
///
/// All operations take the cache lock for their whole duration, which
/// serialises resolution against persistence within one process.
pub struct AccountStore<S, K> {
    store: S,
    sdk: K,
    data_root: PathBuf,
    cache: Mutex<HashMap<Network, Account>>,
}

impl<S, K> AccountStore<S, K>
where
    S: SeedStore,
    K: AccountSdk,
{
    pub fn new(store: S, sdk: K, data_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sdk,
            data_root: data_root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed_file(&self, network: Network) -> PathBuf {
        seed_file_path(&self.data_root, network)
    }

    /// Finds the account for `network` or reports [`AccountError::NotFound`].
    /// Never fabricates an identity.
    pub async fn resolve(&self, network: Network) -> Result<Account, AccountError> {
        let mut cache = self.cache.lock().await;
        let (account, source) = self.resolve_locked(&mut cache, network).await?;
        counter!("account_resolutions_total", "source" => source.as_ref().to_owned()).increment(1);
        Ok(account)
    }

    /// Stores `account` as the authoritative identity for `network`,
    /// overwriting whatever was there.
    pub async fn persist(&self, account: Account, network: Network) -> Result<(), AccountError> {
        let mut cache = self.cache.lock().await;
        self.persist_locked(&mut cache, account, network).await
    }

    /// Generates and persists a new account unless one already resolves.
    pub async fn create(&self, network: Network) -> Result<Account, AccountError> {
        let mut cache = self.cache.lock().await;
        match self.resolve_locked(&mut cache, network).await {
            Ok(_) => return Err(AccountError::AlreadyExists(network)),
            Err(AccountError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let account = self.sdk.new_account(network)?;
        self.persist_locked(&mut cache, account.clone(), network)
            .await?;
        info!(%network, account = %account.account_number, "created account");
        Ok(account)
    }

    /// Replaces the account for `network` with the one behind `phrase`.
    pub async fn recover(&self, phrase: &str, network: Network) -> Result<Account, AccountError> {
        let account = self.sdk.account_from_recovery_phrase(phrase, network)?;
        let mut cache = self.cache.lock().await;
        self.persist_locked(&mut cache, account.clone(), network)
            .await?;
        info!(%network, account = %account.account_number, "recovered account from phrase");
        Ok(account)
    }

    pub async fn recovery_phrase(&self, network: Network) -> Result<String, AccountError> {
        let account = self.resolve(network).await?;
        Ok(self.sdk.recovery_phrase(&account.seed)?)
    }

    /// Re-persists the currently resolved account to both durable sources.
    pub async fn save(&self, network: Network) -> Result<Account, AccountError> {
        let mut cache = self.cache.lock().await;
        let (account, _) = self.resolve_locked(&mut cache, network).await?;
        self.persist_locked(&mut cache, account.clone(), network)
            .await?;
        Ok(account)
    }

    /// Detects and repairs divergence between the store and the seed file.
    /// The store wins; a seed found only in the file is adopted into the
    /// store.
    pub async fn reconcile(&self, network: Network) -> Result<ReconcileOutcome, AccountError> {
        let _cache = self.cache.lock().await;
        let path = self.seed_file(network);
        let stored = self.load_stored_seed(network).await?;
        // With a stored seed an unreadable file is just another divergence.
        let on_disk = match stored {
            Some(_) => read_seed_file(&path).ok().flatten(),
            None => read_seed_file(&path)?,
        };

        let outcome = match (stored, on_disk) {
            (None, None) => ReconcileOutcome::Empty,
            (Some(stored), Some(file)) if stored == file => ReconcileOutcome::InSync,
            (Some(stored), _) => {
                self.derive(&stored, SeedSource::Store)?;
                write_seed_file(&path, &stored)?;
                ReconcileOutcome::FileRewritten
            }
            (None, Some(file)) => {
                self.derive(&file, SeedSource::File)?;
                self.store.save_seed(network, &file).await?;
                ReconcileOutcome::StoreAdopted
            }
        };

        if outcome != ReconcileOutcome::InSync && outcome != ReconcileOutcome::Empty {
            warn!(%network, ?outcome, "seed sources diverged and were reconciled");
        }
        Ok(outcome)
    }

    /// Forgets every cached account; the next resolve goes back to disk.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    async fn resolve_locked(
        &self,
        cache: &mut HashMap<Network, Account>,
        network: Network,
    ) -> Result<(Account, SeedSource), AccountError> {
        if let Some(account) = cache.get(&network) {
            return Ok((account.clone(), SeedSource::Cache));
        }

        let path = self.seed_file(network);
        if let Some(seed) = self.load_stored_seed(network).await? {
            let account = self.derive(&seed, SeedSource::Store)?;
            write_seed_file(&path, &seed)?;
            cache.insert(network, account.clone());
            return Ok((account, SeedSource::Store));
        }

        match read_seed_file(&path)? {
            Some(seed) => {
                let account = self.derive(&seed, SeedSource::File)?;
                cache.insert(network, account.clone());
                Ok((account, SeedSource::File))
            }
            None => Err(AccountError::NotFound(network)),
        }
    }

    async fn persist_locked(
        &self,
        cache: &mut HashMap<Network, Account>,
        account: Account,
        network: Network,
    ) -> Result<(), AccountError> {
        let derived = self.sdk.account_from_seed(&account.seed)?;
        if derived != account.account_number {
            return Err(AccountError::Mismatch);
        }

        self.store.save_seed(network, &account.seed).await?;
        write_seed_file(&self.seed_file(network), &account.seed)?;
        cache.insert(network, account);
        Ok(())
    }

    async fn load_stored_seed(&self, network: Network) -> Result<Option<String>, AccountError> {
        let seed = self.store.load_seed(network).await?;
        Ok(seed.filter(|seed| !seed.trim().is_empty()))
    }

    fn derive(&self, seed: &str, location: SeedSource) -> Result<Account, AccountError> {
        let account_number =
            self.sdk
                .account_from_seed(seed)
                .map_err(|err| AccountError::Corrupt {
                    location,
                    reason: err.to_string(),
                })?;
        Ok(Account::new(account_number, seed))
    }
}

/// Reads `SEED:<value>` from `path`. A missing file is `Ok(None)`.
pub fn read_seed_file(path: &Path) -> Result<Option<String>, AccountError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    parse_seed_line(&contents).map(Some)
}

fn parse_seed_line(contents: &str) -> Result<String, AccountError> {
    let corrupt = |reason: &str| AccountError::Corrupt {
        location: SeedSource::File,
        reason: reason.to_string(),
    };
    let line = contents.trim_end_matches(['\r', '\n']);
    let seed = line
        .strip_prefix(SEED_PREFIX)
        .ok_or_else(|| corrupt("missing SEED: prefix"))?
        .trim();
    if seed.is_empty() {
        return Err(corrupt("empty seed"));
    }
    if seed.contains('\n') {
        return Err(corrupt("more than one line"));
    }
    Ok(seed.to_string())
}

/// Atomically replaces the seed file; the file is readable by the owner only.
pub fn write_seed_file(path: &Path, seed: &str) -> Result<(), AccountError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("sign.tmp");
    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(format!("{SEED_PREFIX}{seed}").as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sdk::Sha3AccountSdk;
    use crate::storage::StorageResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct MemorySeedStore {
        seeds: Arc<StdMutex<HashMap<Network, String>>>,
        loads: Arc<AtomicUsize>,
    }

    impl MemorySeedStore {
        fn put(&self, network: Network, seed: &str) {
            self.seeds.lock().unwrap().insert(network, seed.to_string());
        }

        fn get(&self, network: Network) -> Option<String> {
            self.seeds.lock().unwrap().get(&network).cloned()
        }
    }

    #[async_trait]
    impl SeedStore for MemorySeedStore {
        async fn load_seed(&self, network: Network) -> StorageResult<Option<String>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.get(network))
        }

        async fn save_seed(&self, network: Network, seed: &str) -> StorageResult<()> {
            self.put(network, seed);
            Ok(())
        }
    }

    fn fixture() -> (TempDir, MemorySeedStore, AccountStore<MemorySeedStore, Sha3AccountSdk>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemorySeedStore::default();
        let accounts = AccountStore::new(store.clone(), Sha3AccountSdk, dir.path());
        (dir, store, accounts)
    }

    fn fresh(network: Network) -> Account {
        Sha3AccountSdk.new_account(network).unwrap()
    }

    #[tokio::test]
    async fn reports_not_found_without_any_source() {
        let (_dir, _store, accounts) = fixture();
        let err = accounts.resolve(Network::Bitmark).await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound(Network::Bitmark)));
    }

    #[tokio::test]
    async fn store_wins_over_file_and_rewrites_it() {
        let (_dir, store, accounts) = fixture();
        let in_store = fresh(Network::Bitmark);
        let on_disk = fresh(Network::Bitmark);
        store.put(Network::Bitmark, &in_store.seed);
        write_seed_file(&accounts.seed_file(Network::Bitmark), &on_disk.seed).unwrap();

        let resolved = accounts.resolve(Network::Bitmark).await.unwrap();
        assert_eq!(resolved, in_store);
        assert_eq!(
            read_seed_file(&accounts.seed_file(Network::Bitmark)).unwrap(),
            Some(in_store.seed)
        );
    }

    #[tokio::test]
    async fn falls_back_to_seed_file() {
        let (_dir, store, accounts) = fixture();
        let on_disk = fresh(Network::Testing);
        write_seed_file(&accounts.seed_file(Network::Testing), &on_disk.seed).unwrap();

        let resolved = accounts.resolve(Network::Testing).await.unwrap();
        assert_eq!(resolved, on_disk);
        assert_eq!(store.get(Network::Testing), None);
    }

    #[tokio::test]
    async fn cached_account_skips_io() {
        let (_dir, store, accounts) = fixture();
        let account = fresh(Network::Bitmark);
        accounts.persist(account.clone(), Network::Bitmark).await.unwrap();
        let loads_before = store.loads.load(Ordering::SeqCst);

        assert_eq!(accounts.resolve(Network::Bitmark).await.unwrap(), account);
        assert_eq!(store.loads.load(Ordering::SeqCst), loads_before);
    }

    #[tokio::test]
    async fn persisted_account_survives_cache_clear() {
        let (_dir, _store, accounts) = fixture();
        let account = fresh(Network::Testing);
        accounts.persist(account.clone(), Network::Testing).await.unwrap();
        accounts.clear_cache().await;

        assert_eq!(accounts.resolve(Network::Testing).await.unwrap(), account);
    }

    #[tokio::test]
    async fn persisted_account_survives_store_loss_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let account = fresh(Network::Bitmark);
        {
            let accounts =
                AccountStore::new(MemorySeedStore::default(), Sha3AccountSdk, dir.path());
            accounts
                .persist(account.clone(), Network::Bitmark)
                .await
                .unwrap();
        }

        let accounts = AccountStore::new(MemorySeedStore::default(), Sha3AccountSdk, dir.path());
        assert_eq!(accounts.resolve(Network::Bitmark).await.unwrap(), account);
    }

    #[tokio::test]
    async fn networks_do_not_share_seeds() {
        let (_dir, store, accounts) = fixture();
        let live = fresh(Network::Bitmark);
        let test = fresh(Network::Testing);
        accounts.persist(live.clone(), Network::Bitmark).await.unwrap();
        accounts.persist(test.clone(), Network::Testing).await.unwrap();

        assert_eq!(accounts.resolve(Network::Bitmark).await.unwrap(), live);
        assert_eq!(accounts.resolve(Network::Testing).await.unwrap(), test);
        assert_eq!(store.get(Network::Bitmark), Some(live.seed));
    }

    #[tokio::test]
    async fn malformed_seed_file_is_corrupt() {
        let (_dir, _store, accounts) = fixture();
        let path = accounts.seed_file(Network::Bitmark);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not a seed").unwrap();

        let err = accounts.resolve(Network::Bitmark).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::Corrupt {
                location: SeedSource::File,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn undecodable_store_seed_is_corrupt() {
        let (_dir, store, accounts) = fixture();
        store.put(Network::Bitmark, "garbage");

        let err = accounts.resolve(Network::Bitmark).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::Corrupt {
                location: SeedSource::Store,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn create_refuses_to_replace_existing_account() {
        let (_dir, _store, accounts) = fixture();
        let created = accounts.create(Network::Testing).await.unwrap();
        assert_eq!(accounts.resolve(Network::Testing).await.unwrap(), created);

        let err = accounts.create(Network::Testing).await.unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists(Network::Testing)));
    }

    #[tokio::test]
    async fn recover_overwrites_and_phrase_round_trips() {
        let (_dir, _store, accounts) = fixture();
        accounts.create(Network::Bitmark).await.unwrap();
        let other = fresh(Network::Bitmark);
        let phrase = Sha3AccountSdk.recovery_phrase(&other.seed).unwrap();

        let recovered = accounts.recover(&phrase, Network::Bitmark).await.unwrap();
        assert_eq!(recovered, other);
        assert_eq!(accounts.recovery_phrase(Network::Bitmark).await.unwrap(), phrase);
    }

    #[tokio::test]
    async fn persist_rejects_mismatched_account() {
        let (_dir, _store, accounts) = fixture();
        let mut account = fresh(Network::Bitmark);
        account.account_number = "deadbeef".into();
        let err = accounts.persist(account, Network::Bitmark).await.unwrap_err();
        assert!(matches!(err, AccountError::Mismatch));
    }

    #[tokio::test]
    async fn reconcile_adopts_file_only_seed() {
        let (_dir, store, accounts) = fixture();
        assert_eq!(
            accounts.reconcile(Network::Bitmark).await.unwrap(),
            ReconcileOutcome::Empty
        );

        let on_disk = fresh(Network::Bitmark);
        write_seed_file(&accounts.seed_file(Network::Bitmark), &on_disk.seed).unwrap();
        assert_eq!(
            accounts.reconcile(Network::Bitmark).await.unwrap(),
            ReconcileOutcome::StoreAdopted
        );
        assert_eq!(store.get(Network::Bitmark), Some(on_disk.seed));
        assert_eq!(
            accounts.reconcile(Network::Bitmark).await.unwrap(),
            ReconcileOutcome::InSync
        );
    }

    #[tokio::test]
    async fn reconcile_rewrites_diverged_file() {
        let (_dir, store, accounts) = fixture();
        let in_store = fresh(Network::Testing);
        store.put(Network::Testing, &in_store.seed);
        write_seed_file(
            &accounts.seed_file(Network::Testing),
            &fresh(Network::Testing).seed,
        )
        .unwrap();

        assert_eq!(
            accounts.reconcile(Network::Testing).await.unwrap(),
            ReconcileOutcome::FileRewritten
        );
        assert_eq!(
            read_seed_file(&accounts.seed_file(Network::Testing)).unwrap(),
            Some(in_store.seed)
        );
    }

    #[tokio::test]
    async fn reconcile_replaces_malformed_file_when_store_has_seed() {
        let (_dir, store, accounts) = fixture();
        let in_store = fresh(Network::Bitmark);
        store.put(Network::Bitmark, &in_store.seed);
        let path = accounts.seed_file(Network::Bitmark);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "garbage").unwrap();

        assert_eq!(
            accounts.reconcile(Network::Bitmark).await.unwrap(),
            ReconcileOutcome::FileRewritten
        );
        assert_eq!(read_seed_file(&path).unwrap(), Some(in_store.seed));
    }

    #[tokio::test]
    async fn reconcile_reports_malformed_file_without_stored_seed() {
        let (_dir, _store, accounts) = fixture();
        let path = accounts.seed_file(Network::Bitmark);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "garbage").unwrap();

        assert!(matches!(
            accounts.reconcile(Network::Bitmark).await,
            Err(AccountError::Corrupt {
                location: SeedSource::File,
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn seed_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net").join("proof.sign");
        write_seed_file(&path, "Tabc").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "SEED:Tabc");
    }
}
