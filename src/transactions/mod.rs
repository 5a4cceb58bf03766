//! Deposits and withdrawals.
//!
//! Players submit requests; an admin confirms or rejects them. Processing
//! is a check-and-set on the transaction status under the transaction's
//! lock, so a request can only ever be settled once. Confirmed deposits
//! credit the balance, confirmed withdrawals debit it.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::TransactionsConfig;
use crate::storage::{AccountStore, KeyedLocks};
use crate::types::{
    ServiceError, ServiceResult, Transaction, TransactionFilter, TransactionKind,
    TransactionStatus,
};

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;
const ADDRESS_MIN_LEN: usize = 32;
const ADDRESS_MAX_LEN: usize = 44;

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub blockchain_address: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub blockchain_address: Option<String>,
}

/// Admin decision on a pending transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// Amount actually received; required to confirm a deposit.
    #[serde(default)]
    pub admin_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Confirm,
    Reject,
}

/// Paging parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    fn slice(all: Vec<T>, page: Option<usize>, limit: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let total = all.len();
        let offset = (page - 1).saturating_mul(limit);
        let items = all.into_iter().skip(offset).take(limit).collect();
        Page {
            items,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        }
    }
}

/// Pending deposit as shown to admins.
#[derive(Debug, Clone, Serialize)]
pub struct PendingDeposit {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub pending_deposits: usize,
    pub pending_withdrawals: usize,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct TransactionService {
    store: Arc<dyn AccountStore>,
    locks: Arc<KeyedLocks>,
    config: TransactionsConfig,
}

impl TransactionService {
    pub fn new(store: Arc<dyn AccountStore>, locks: Arc<KeyedLocks>, config: TransactionsConfig) -> Self {
        Self { store, locks, config }
    }

    pub async fn submit_deposit(&self, account_id: &str, req: DepositRequest) -> ServiceResult<Transaction> {
        let (Some(amount), Some(address), Some(tx_hash)) =
            (req.amount, req.blockchain_address, req.tx_hash.filter(|h| !h.is_empty()))
        else {
            return Err(ServiceError::Validation(
                "Amount, blockchain address and transaction hash are required".into(),
            ));
        };
        if amount <= Decimal::ZERO {
            return Err(ServiceError::Validation("Amount must be greater than 0".into()));
        }
        validate_address(&address)?;
        self.ensure_account(account_id).await?;

        let tx = new_transaction(account_id, TransactionKind::Deposit, amount, address, Some(tx_hash));
        self.store.insert_transaction(tx.clone()).await?;
        info!(tx = %tx.id, user = account_id, amount = %amount, "Deposit requested");
        Ok(tx)
    }

    pub async fn submit_withdrawal(&self, account_id: &str, req: WithdrawRequest) -> ServiceResult<Transaction> {
        let (Some(amount), Some(address)) = (req.amount, req.blockchain_address) else {
            return Err(ServiceError::Validation(
                "Amount and blockchain address are required".into(),
            ));
        };
        if amount < self.config.min_withdraw {
            return Err(ServiceError::Validation(format!(
                "Minimum withdrawal amount is {}",
                self.config.min_withdraw
            )));
        }
        validate_address(&address)?;

        let _guard = self.locks.lock(account_id).await;
        let balance = self.store.balance(account_id).await?;
        if balance < amount {
            return Err(ServiceError::Validation("Insufficient balance".into()));
        }

        let since = Utc::now() - Duration::hours(24);
        let withdrawn_today: Decimal = self
            .store
            .transactions(&TransactionFilter {
                user_id: Some(account_id.to_string()),
                kind: Some(TransactionKind::Withdraw),
                status: None,
            })
            .await?
            .iter()
            .filter(|t| t.status != TransactionStatus::Rejected && t.created_at >= since)
            .map(|t| t.amount)
            .sum();
        if withdrawn_today + amount > self.config.daily_withdraw_limit {
            return Err(ServiceError::Validation(format!(
                "Daily withdrawal limit of {} exceeded",
                self.config.daily_withdraw_limit
            )));
        }

        let tx = new_transaction(account_id, TransactionKind::Withdraw, amount, address, None);
        self.store.insert_transaction(tx.clone()).await?;
        info!(tx = %tx.id, user = account_id, amount = %amount, "Withdrawal requested");
        Ok(tx)
    }

    pub async fn history(&self, account_id: &str, query: HistoryQuery) -> ServiceResult<Page<Transaction>> {
        let filter = TransactionFilter {
            user_id: Some(account_id.to_string()),
            kind: query.kind.as_deref().map(parse_kind).transpose()?,
            status: query.status.as_deref().map(parse_status).transpose()?,
        };
        let all = self.store.transactions(&filter).await?;
        Ok(Page::slice(all, query.page, query.limit))
    }

    pub async fn pending_deposits(&self, query: PageQuery) -> ServiceResult<Page<PendingDeposit>> {
        let pending = self
            .store
            .transactions(&TransactionFilter {
                user_id: None,
                kind: Some(TransactionKind::Deposit),
                status: Some(TransactionStatus::Pending),
            })
            .await?;

        let mut items = Vec::with_capacity(pending.len());
        for tx in pending {
            let username = self
                .store
                .account(&tx.user_id)
                .await?
                .map(|a| a.username)
                .unwrap_or_default();
            items.push(PendingDeposit {
                transaction: tx,
                username,
            });
        }
        Ok(Page::slice(items, query.page, query.limit))
    }

    pub async fn process_deposit(&self, req: ProcessRequest, admin: &str) -> ServiceResult<Transaction> {
        self.process(TransactionKind::Deposit, req, admin).await
    }

    pub async fn process_withdrawal(&self, req: ProcessRequest, admin: &str) -> ServiceResult<Transaction> {
        self.process(TransactionKind::Withdraw, req, admin).await
    }

    pub async fn stats(&self) -> ServiceResult<TransactionStats> {
        let all = self.store.transactions(&TransactionFilter::default()).await?;
        let mut stats = TransactionStats {
            pending_deposits: 0,
            pending_withdrawals: 0,
            total_deposits: Decimal::ZERO,
            total_withdrawals: Decimal::ZERO,
        };
        for tx in &all {
            match (tx.kind, tx.status) {
                (TransactionKind::Deposit, TransactionStatus::Pending) => stats.pending_deposits += 1,
                (TransactionKind::Withdraw, TransactionStatus::Pending) => stats.pending_withdrawals += 1,
                (TransactionKind::Deposit, TransactionStatus::Completed) => stats.total_deposits += tx.amount,
                (TransactionKind::Withdraw, TransactionStatus::Completed) => {
                    stats.total_withdrawals += tx.amount
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn process(&self, kind: TransactionKind, req: ProcessRequest, admin: &str) -> ServiceResult<Transaction> {
        let (Some(id), Some(action)) = (req.transaction_id, req.action) else {
            return Err(ServiceError::Validation(
                "Transaction ID and action are required".into(),
            ));
        };
        let action = match action.as_str() {
            "confirm" => Action::Confirm,
            "reject" => Action::Reject,
            _ => {
                return Err(ServiceError::Validation(
                    "Action must be either confirm or reject".into(),
                ))
            }
        };
        let rejection_reason = req.rejection_reason.filter(|r| !r.trim().is_empty());
        if action == Action::Reject && rejection_reason.is_none() {
            return Err(ServiceError::Validation("Rejection reason is required".into()));
        }
        let admin_amount = match (kind, action) {
            (TransactionKind::Deposit, Action::Confirm) => match req.admin_amount {
                Some(a) if a > Decimal::ZERO => Some(a),
                _ => {
                    return Err(ServiceError::Validation(
                        "Valid admin amount is required for confirmation".into(),
                    ))
                }
            },
            _ => None,
        };

        let _tx_guard = self.locks.lock(&format!("tx:{id}")).await;
        let mut tx = self
            .store
            .transaction(&id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Transaction not found".into()))?;
        if tx.kind != kind {
            return Err(ServiceError::Validation(match kind {
                TransactionKind::Deposit => "Only deposit transactions can be processed".into(),
                TransactionKind::Withdraw => "Only withdrawal transactions can be processed".into(),
            }));
        }
        if !tx.is_pending() {
            return Err(ServiceError::Conflict("Transaction has already been processed".into()));
        }

        if action == Action::Confirm {
            let _account_guard = self.locks.lock(&tx.user_id).await;
            let balance = self.store.balance(&tx.user_id).await?;
            let new_balance = match kind {
                TransactionKind::Deposit => {
                    if let Some(amount) = admin_amount {
                        tx.amount = amount;
                    }
                    balance + tx.amount
                }
                TransactionKind::Withdraw => {
                    if balance < tx.amount {
                        return Err(ServiceError::Validation("Insufficient balance".into()));
                    }
                    balance - tx.amount
                }
            };
            self.store.set_balance(&tx.user_id, new_balance).await?;
        }

        let now = Utc::now();
        tx.status = match action {
            Action::Confirm => TransactionStatus::Completed,
            Action::Reject => TransactionStatus::Rejected,
        };
        tx.rejection_reason = rejection_reason;
        if req.tx_hash.is_some() {
            tx.tx_hash = req.tx_hash;
        }
        tx.processed_by = Some(admin.to_string());
        tx.processed_at = Some(now);
        tx.updated_at = now;
        self.store.save_transaction(&tx).await?;

        info!(
            tx = %tx.id,
            kind = %tx.kind,
            status = %tx.status,
            amount = %tx.amount,
            user = %tx.user_id,
            "Transaction processed"
        );
        Ok(tx)
    }

    async fn ensure_account(&self, account_id: &str) -> ServiceResult<()> {
        match self.store.account(account_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound("User not found".into())),
        }
    }
}

fn new_transaction(
    account_id: &str,
    kind: TransactionKind,
    amount: Decimal,
    address: String,
    tx_hash: Option<String>,
) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: format!("tx-{}", Uuid::new_v4().simple()),
        user_id: account_id.to_string(),
        kind,
        amount,
        blockchain_address: address,
        tx_hash,
        status: TransactionStatus::Pending,
        rejection_reason: None,
        processed_by: None,
        processed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// 32–44 ASCII letters and digits.
fn validate_address(address: &str) -> ServiceResult<()> {
    let ok = (ADDRESS_MIN_LEN..=ADDRESS_MAX_LEN).contains(&address.len())
        && address.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(ServiceError::Validation("Invalid blockchain address".into()))
    }
}

fn parse_kind(raw: &str) -> ServiceResult<TransactionKind> {
    match raw {
        "deposit" => Ok(TransactionKind::Deposit),
        "withdraw" => Ok(TransactionKind::Withdraw),
        other => Err(ServiceError::Validation(format!("Unknown transaction type: {other}"))),
    }
}

fn parse_status(raw: &str) -> ServiceResult<TransactionStatus> {
    match raw {
        "pending" => Ok(TransactionStatus::Pending),
        "completed" => Ok(TransactionStatus::Completed),
        "rejected" => Ok(TransactionStatus::Rejected),
        other => Err(ServiceError::Validation(format!("Unknown transaction status: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
