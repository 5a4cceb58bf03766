//! Game service: applies settlements to stored accounts.
//!
//! Holds the account's lock across balance read → settle → balance write,
//! then records the game and the caller-owned aggregates.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::settlement;
use super::DiceRoller;
use crate::config::GameConfig;
use crate::storage::{AccountStore, KeyedLocks};
use crate::types::{
    BetRequest, GameRecord, ServiceError, ServiceResult, SettlementResult, UserView,
};

/// Default number of records returned by `history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;
/// Upper bound on `history` page size.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// A settled roll plus the player's updated figures.
#[derive(Debug, Clone, Serialize)]
pub struct RollOutcome {
    pub result: SettlementResult,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub total_bets: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub win_rate: f64,
    pub total_profit: Decimal,
    pub balance: Decimal,
}

pub struct GameService {
    config: GameConfig,
    store: Arc<dyn AccountStore>,
    locks: Arc<KeyedLocks>,
    roller: Arc<dyn DiceRoller>,
}

impl GameService {
    pub fn new(
        config: GameConfig,
        store: Arc<dyn AccountStore>,
        locks: Arc<KeyedLocks>,
        roller: Arc<dyn DiceRoller>,
    ) -> Self {
        Self {
            config,
            store,
            locks,
            roller,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Settle one bet for `account_id` and persist the outcome.
    pub async fn roll(&self, account_id: &str, request: &BetRequest) -> ServiceResult<RollOutcome> {
        let _guard = self.locks.lock(account_id).await;

        let mut account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        if !account.is_active() {
            return Err(ServiceError::Forbidden("Account is frozen".into()));
        }

        let result = settlement::settle(request, &self.config, account.balance, self.roller.as_ref())?;

        account.balance = result.balance_after;
        account.stats.record(&result);
        account.updated_at = Utc::now();
        self.store.save_account(&account).await?;
        self.store
            .append_game(GameRecord::from_settlement(account_id, &result))
            .await?;

        info!(
            user = %account.username,
            amount = %result.bet_amount,
            option = %result.bet_option,
            multiplier = result.multiplier,
            dice = result.dice_result,
            win = result.win,
            profit = %result.profit,
            balance = %result.balance_after,
            "Bet settled"
        );

        Ok(RollOutcome {
            result,
            user: account.view(),
        })
    }

    /// Newest-first game records. `limit` defaults to 5 and is capped at 100.
    pub async fn history(&self, account_id: &str, limit: Option<usize>) -> ServiceResult<Vec<GameRecord>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.store.games_for(account_id, limit).await?)
    }

    pub async fn stats(&self, account_id: &str) -> ServiceResult<GameStats> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        let s = &account.stats;
        Ok(GameStats {
            total_bets: s.total_bets,
            total_wins: s.total_wins,
            total_losses: s.total_losses,
            win_rate: s.win_rate(),
            total_profit: s.total_profit,
            balance: account.balance,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
