//! Persistence layer.
//!
//! Defines the `AccountStore` trait the services are written against,
//! per-key async locks used to serialise balance read-modify-write, and
//! JSON snapshot save/load for the in-memory store. A real database can
//! be slotted in behind the trait later; the snapshot is enough to carry
//! balances across restarts.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::types::{Account, GameRecord, StoreError, Transaction, TransactionFilter};

pub use memory::{MemoryStore, StoreSnapshot};

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstraction over account, game and transaction storage.
///
/// Implementors are not required to make read-modify-write sequences
/// atomic; callers that update balances hold the account's
/// [`KeyedLocks`] guard for the whole sequence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Usernames are unique.
    async fn insert_account(&self, account: Account) -> StoreResult<()>;

    async fn account(&self, id: &str) -> StoreResult<Option<Account>>;

    /// Look up by (already lowercased) username.
    async fn account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    async fn accounts(&self) -> StoreResult<Vec<Account>>;

    /// Overwrite an existing account.
    async fn save_account(&self, account: &Account) -> StoreResult<()>;

    async fn balance(&self, id: &str) -> StoreResult<Decimal>;

    async fn set_balance(&self, id: &str, balance: Decimal) -> StoreResult<()>;

    async fn append_game(&self, record: GameRecord) -> StoreResult<()>;

    /// Most recent games for an account, newest first.
    async fn games_for(&self, account_id: &str, limit: usize) -> StoreResult<Vec<GameRecord>>;

    /// All games created at or after `since`.
    async fn games_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<GameRecord>>;

    async fn insert_transaction(&self, tx: Transaction) -> StoreResult<()>;

    async fn transaction(&self, id: &str) -> StoreResult<Option<Transaction>>;

    async fn save_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    /// Matching transactions, newest first.
    async fn transactions(&self, filter: &TransactionFilter) -> StoreResult<Vec<Transaction>>;
}

// ---------------------------------------------------------------------------
// Keyed locks
// ---------------------------------------------------------------------------

/// One async mutex per key (account id, transaction id).
///
/// Holding the guard serialises every balance read → compute → write for
/// that key, so concurrent bets on one account cannot lose updates. A key
/// is dropped from the table once nobody holds or waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let slot = {
            let mut map = self.table();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        KeyedGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(slot.lock_owned().await),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held lock on one key. Releasing the last reference removes the key.
pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.table();
        // Waiters clone the slot under the table lock, so a count of one
        // means only the table still refers to it.
        if map.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            map.remove(&self.key);
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Save a store snapshot to a JSON file.
pub fn save_snapshot(snapshot: &StoreSnapshot, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialise store snapshot")?;

    std::fs::write(path, &json).context(format!("Failed to write snapshot to {path}"))?;

    debug!(
        path,
        accounts = snapshot.accounts.len(),
        games = snapshot.games.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a store snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: &str) -> Result<Option<StoreSnapshot>> {
    if !Path::new(path).exists() {
        info!(path, "No snapshot found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: StoreSnapshot =
        serde_json::from_str(&json).context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        accounts = snapshot.accounts.len(),
        games = snapshot.games.len(),
        transactions = snapshot.transactions.len(),
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the snapshot file (for testing or reset).
pub fn delete_snapshot(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete snapshot {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
