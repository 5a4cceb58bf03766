//! Shared types for the dice betting service.
//!
//! These types form the data model used across all modules: bet options
//! and settlement results, accounts with their caller-owned aggregates,
//! game records, deposit/withdrawal transactions, and the error taxonomy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Bet options
// ---------------------------------------------------------------------------

/// What the player is betting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "BetOptionRepr", try_from = "BetOptionRepr")]
pub enum BetOption {
    /// Wins on 1, 2 or 3.
    Small,
    /// Wins on 4, 5 or 6.
    Large,
    /// Wins only on this exact face (1–6).
    Exact(u8),
}

impl BetOption {
    /// Whether this option is a single-face bet.
    pub fn is_exact(&self) -> bool {
        matches!(self, BetOption::Exact(_))
    }
}

impl fmt::Display for BetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetOption::Small => write!(f, "small"),
            BetOption::Large => write!(f, "large"),
            BetOption::Exact(n) => write!(f, "{n}"),
        }
    }
}

/// Wire form: `"small"`, `"large"` or a bare number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BetOptionRepr {
    Named(String),
    Number(u8),
}

impl From<BetOption> for BetOptionRepr {
    fn from(option: BetOption) -> Self {
        match option {
            BetOption::Small => BetOptionRepr::Named("small".into()),
            BetOption::Large => BetOptionRepr::Named("large".into()),
            BetOption::Exact(n) => BetOptionRepr::Number(n),
        }
    }
}

impl TryFrom<BetOptionRepr> for BetOption {
    type Error = BetError;

    fn try_from(repr: BetOptionRepr) -> Result<Self, Self::Error> {
        match repr {
            BetOptionRepr::Named(name) => BetOption::try_from(&BetOptionInput::Named(name)),
            BetOptionRepr::Number(n) => {
                BetOption::try_from(&BetOptionInput::Number(serde_json::Number::from(n)))
            }
        }
    }
}

/// Bet option exactly as the caller sent it, before validation.
///
/// Anything that is neither a string nor a number lands in `Other` so
/// that validation, not deserialisation, reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BetOptionInput {
    Named(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl From<BetOption> for BetOptionInput {
    fn from(option: BetOption) -> Self {
        match option {
            BetOption::Small => BetOptionInput::Named("small".into()),
            BetOption::Large => BetOptionInput::Named("large".into()),
            BetOption::Exact(n) => BetOptionInput::Number(serde_json::Number::from(n)),
        }
    }
}

impl TryFrom<&BetOptionInput> for BetOption {
    type Error = BetError;

    fn try_from(input: &BetOptionInput) -> Result<Self, Self::Error> {
        match input {
            BetOptionInput::Named(name) => match name.as_str() {
                "small" => Ok(BetOption::Small),
                "large" => Ok(BetOption::Large),
                _ => Err(BetError::InvalidOption),
            },
            BetOptionInput::Number(n) => match n.as_u64() {
                Some(face @ 1..=6) => Ok(BetOption::Exact(face as u8)),
                _ => Err(BetError::InvalidOption),
            },
            BetOptionInput::Other(_) => Err(BetError::InvalidOption),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet request / settlement
// ---------------------------------------------------------------------------

/// An unvalidated bet as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    #[serde(default)]
    pub bet_amount: Option<Decimal>,
    #[serde(default)]
    pub bet_option: Option<BetOptionInput>,
    #[serde(default)]
    pub multiplier: Option<i64>,
}

impl BetRequest {
    /// Build a fully-populated request.
    pub fn new(amount: Decimal, option: BetOption, multiplier: i64) -> Self {
        Self {
            bet_amount: Some(amount),
            bet_option: Some(option.into()),
            multiplier: Some(multiplier),
        }
    }
}

/// Outcome of one settled bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub dice_result: u8,
    pub win: bool,
    pub profit: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub bet_amount: Decimal,
    pub bet_option: BetOption,
    pub multiplier: u32,
    pub odds: Decimal,
    pub potential_win: Decimal,
}

impl fmt::Display for SettlementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x{} on {} → rolled {} ({}) profit={} balance={}",
            self.bet_amount,
            self.multiplier,
            self.bet_option,
            self.dice_result,
            if self.win { "WIN" } else { "LOSS" },
            self.profit,
            self.balance_after,
        )
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Frozen,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Frozen => write!(f, "frozen"),
        }
    }
}

/// Running per-player aggregates. Owned by the account, updated by the
/// game service after every settlement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_bets: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_profit: Decimal,
    pub current_streak: u32,
    pub max_winning_streak: u32,
}

impl PlayerStats {
    /// Fold one settlement into the aggregates.
    pub fn record(&mut self, result: &SettlementResult) {
        self.total_bets += 1;
        self.total_profit += result.profit;
        if result.win {
            self.total_wins += 1;
            self.current_streak += 1;
            self.max_winning_streak = self.max_winning_streak.max(self.current_streak);
        } else {
            self.total_losses += 1;
            self.current_streak = 0;
        }
    }

    /// Win rate as a percentage rounded to two decimals. 0.0 with no bets.
    pub fn win_rate(&self) -> f64 {
        win_rate_pct(self.total_wins, self.total_bets)
    }
}

/// Percentage of `wins` over `bets`, rounded to two decimals.
pub fn win_rate_pct(wins: u64, bets: u64) -> f64 {
    if bets == 0 {
        0.0
    } else {
        ((wins as f64 / bets as f64) * 10_000.0).round() / 100.0
    }
}

/// A registered player, as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
    pub balance: Decimal,
    pub stats: PlayerStats,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Public view without credentials.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            username: self.username.clone(),
            balance: self.balance,
            total_bets: self.stats.total_bets,
            total_wins: self.stats.total_wins,
            total_losses: self.stats.total_losses,
            total_profit: self.stats.total_profit,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What callers get to see of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub balance: Decimal,
    pub total_bets: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_profit: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Game records
// ---------------------------------------------------------------------------

/// One settled bet, kept for history, stats and leaderboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub bet_amount: Decimal,
    pub bet_option: BetOption,
    pub multiplier: u32,
    pub odds: Decimal,
    pub dice_result: u8,
    pub win: bool,
    pub profit: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl GameRecord {
    pub fn from_settlement(user_id: &str, result: &SettlementResult) -> Self {
        Self {
            id: format!("game-{}", uuid::Uuid::new_v4()),
            user_id: user_id.to_string(),
            bet_amount: result.bet_amount,
            bet_option: result.bet_option,
            multiplier: result.multiplier,
            odds: result.odds,
            dice_result: result.dice_result,
            win: result.win,
            profit: result.profit,
            balance_before: result.balance_before,
            balance_after: result.balance_after,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A deposit or withdrawal request and its admin outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub blockchain_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

/// Selection criteria for transaction listings. `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<String>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.user_id.as_deref().map_or(true, |id| tx.user_id == id)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.status.map_or(true, |s| tx.status == s)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a bet is refused before any die is rolled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BetError {
    #[error("All fields (betAmount, betOption, multiplier) are required")]
    MissingField,

    #[error("Minimum bet is {min}")]
    BelowMinBet { min: Decimal },

    #[error("Maximum bet is {max}")]
    AboveMaxBet { max: Decimal },

    #[error("Multiplier must be between 1 and {max}")]
    MultiplierOutOfRange { max: u32 },

    #[error("Bet option must be small, large, or a number between 1 and 6")]
    InvalidOption,

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },
}

/// Failures raised by an `AccountStore`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// The backing store is internally inconsistent or unreachable.
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by the service layer to the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Bet(#[from] BetError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
