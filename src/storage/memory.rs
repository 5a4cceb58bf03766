//! In-memory `AccountStore` backed by `tokio::sync::RwLock` maps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AccountStore, StoreResult};
use crate::types::{Account, GameRecord, StoreError, Transaction, TransactionFilter};

/// Serializable image of a `MemoryStore`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub accounts: Vec<Account>,
    pub games: Vec<GameRecord>,
    pub transactions: Vec<Transaction>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    /// username → account id
    usernames: HashMap<String, String>,
    /// Append-only, oldest first.
    games: Vec<GameRecord>,
    transactions: HashMap<String, Transaction>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = Inner::default();
        for account in snapshot.accounts {
            inner.usernames.insert(account.username.clone(), account.id.clone());
            inner.accounts.insert(account.id.clone(), account);
        }
        inner.games = snapshot.games;
        inner.games.sort_by_key(|g| g.created_at);
        for tx in snapshot.transactions {
            inner.transactions.insert(tx.id.clone(), tx);
        }
        Self { inner: RwLock::new(inner) }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let mut transactions: Vec<Transaction> = inner.transactions.values().cloned().collect();
        transactions.sort_by_key(|t| t.created_at);
        StoreSnapshot {
            accounts,
            games: inner.games.clone(),
            transactions,
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.usernames.contains_key(&account.username) {
            return Err(StoreError::DuplicateUsername(account.username));
        }
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::DuplicateId(account.id));
        }
        inner.usernames.insert(account.username.clone(), account.id.clone());
        inner.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn account(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(id).cloned())
    }

    async fn account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        let Some(id) = inner.usernames.get(username) else {
            return Ok(None);
        };
        match inner.accounts.get(id) {
            Some(account) => Ok(Some(account.clone())),
            None => Err(StoreError::Backend(format!(
                "username {username} is indexed to missing account {id}"
            ))),
        }
    }

    async fn accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.inner.read().await.accounts.values().cloned().collect())
    }

    async fn save_account(&self, account: &Account) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let previous = inner
            .accounts
            .get(&account.id)
            .map(|a| a.username.clone())
            .ok_or_else(|| StoreError::AccountNotFound(account.id.clone()))?;

        if previous != account.username {
            if inner.usernames.contains_key(&account.username) {
                return Err(StoreError::DuplicateUsername(account.username.clone()));
            }
            inner.usernames.remove(&previous);
            inner.usernames.insert(account.username.clone(), account.id.clone());
        }
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn balance(&self, id: &str) -> StoreResult<Decimal> {
        self.inner
            .read()
            .await
            .accounts
            .get(id)
            .map(|a| a.balance)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))
    }

    async fn set_balance(&self, id: &str, balance: Decimal) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))?;
        account.balance = balance;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn append_game(&self, record: GameRecord) -> StoreResult<()> {
        self.inner.write().await.games.push(record);
        Ok(())
    }

    async fn games_for(&self, account_id: &str, limit: usize) -> StoreResult<Vec<GameRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .iter()
            .rev()
            .filter(|g| g.user_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn games_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<GameRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .iter()
            .filter(|g| g.created_at >= since)
            .cloned()
            .collect())
    }

    async fn insert_transaction(&self, tx: Transaction) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx.id) {
            return Err(StoreError::DuplicateId(tx.id));
        }
        inner.transactions.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn transaction(&self, id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(id).cloned())
    }

    async fn save_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.transactions.get_mut(&tx.id) {
            Some(slot) => {
                *slot = tx.clone();
                Ok(())
            }
            None => Err(StoreError::TransactionNotFound(tx.id.clone())),
        }
    }

    async fn transactions(&self, filter: &TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }
}
