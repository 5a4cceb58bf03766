//! Leaderboards.
//!
//! Rankings are computed on demand from stored accounts and game records:
//! trailing-24h profit, all-time profit, and longest winning streak, plus
//! platform-wide aggregates. Ties break on username so ordering is stable.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::AccountStore;
use crate::types::{win_rate_pct, Account, ServiceError, ServiceResult};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub total_bets: u64,
    pub win_rate: f64,
    pub balance: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_profit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_winning_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_wins: Option<u64>,
}

impl LeaderboardEntry {
    fn base(account: &Account) -> Self {
        Self {
            user_id: account.id.clone(),
            username: account.username.clone(),
            total_bets: account.stats.total_bets,
            win_rate: account.stats.win_rate(),
            balance: account.balance,
            profit_24h: None,
            total_profit: None,
            max_winning_streak: None,
            total_wins: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStats {
    pub total_users: usize,
    pub total_bets: u64,
    pub total_profit: Decimal,
    pub platform_profit: Decimal,
    pub average_win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionFigures {
    pub user_id: String,
    pub username: String,
    pub total_profit: Decimal,
    pub profit_24h: Decimal,
    pub total_bets: u64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Positions {
    pub profit_24h: usize,
    pub all_time: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPosition {
    pub user: PositionFigures,
    pub positions: Positions,
}

pub struct Leaderboard {
    store: Arc<dyn AccountStore>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Players who bet in the last 24 hours, by profit over that window.
    pub async fn last_24h(&self, limit: Option<usize>) -> ServiceResult<Vec<LeaderboardEntry>> {
        let profits = self.profits_24h().await?;
        let accounts = self.store.accounts().await?;

        let mut ranked: Vec<(Decimal, &Account)> = accounts
            .iter()
            .filter_map(|a| profits.get(&a.id).map(|p| (*p, a)))
            .collect();
        ranked.sort_by(|(pa, a), (pb, b)| by_metric_desc(pa, pb, a, b));

        Ok(ranked
            .into_iter()
            .take(clamp_limit(limit))
            .map(|(profit, a)| LeaderboardEntry {
                profit_24h: Some(profit),
                ..LeaderboardEntry::base(a)
            })
            .collect())
    }

    pub async fn all_time(&self, limit: Option<usize>) -> ServiceResult<Vec<LeaderboardEntry>> {
        let mut accounts = self.store.accounts().await?;
        accounts.sort_by(|a, b| by_metric_desc(&a.stats.total_profit, &b.stats.total_profit, a, b));

        Ok(accounts
            .iter()
            .take(clamp_limit(limit))
            .map(|a| LeaderboardEntry {
                total_profit: Some(a.stats.total_profit),
                ..LeaderboardEntry::base(a)
            })
            .collect())
    }

    pub async fn winning_streak(&self, limit: Option<usize>) -> ServiceResult<Vec<LeaderboardEntry>> {
        let mut accounts = self.store.accounts().await?;
        accounts.sort_by(|a, b| {
            by_metric_desc(&a.stats.max_winning_streak, &b.stats.max_winning_streak, a, b)
        });

        Ok(accounts
            .iter()
            .take(clamp_limit(limit))
            .map(|a| LeaderboardEntry {
                max_winning_streak: Some(a.stats.max_winning_streak),
                total_wins: Some(a.stats.total_wins),
                total_profit: Some(a.stats.total_profit),
                ..LeaderboardEntry::base(a)
            })
            .collect())
    }

    pub async fn stats(&self) -> ServiceResult<LeaderboardStats> {
        let accounts = self.store.accounts().await?;
        let total_bets = accounts.iter().map(|a| a.stats.total_bets).sum();
        let total_profit: Decimal = accounts.iter().map(|a| a.stats.total_profit).sum();

        let rates: Vec<f64> = accounts
            .iter()
            .filter(|a| a.stats.total_bets > 0)
            .map(|a| win_rate_pct(a.stats.total_wins, a.stats.total_bets))
            .collect();
        let average_win_rate = if rates.is_empty() {
            0.0
        } else {
            (rates.iter().sum::<f64>() / rates.len() as f64 * 100.0).round() / 100.0
        };

        Ok(LeaderboardStats {
            total_users: accounts.len(),
            total_bets,
            total_profit,
            platform_profit: -total_profit,
            average_win_rate,
        })
    }

    /// The user's figures and 1-based rank on the 24h and all-time boards.
    /// Players with no bets in the window count as zero 24h profit.
    pub async fn user_position(&self, user_id: &str) -> ServiceResult<UserPosition> {
        let accounts = self.store.accounts().await?;
        let me = accounts
            .iter()
            .find(|a| a.id == user_id)
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        let profits = self.profits_24h().await?;
        let profit_of = |a: &Account| profits.get(&a.id).copied().unwrap_or(Decimal::ZERO);

        let rank = |metric: &dyn Fn(&Account) -> Decimal| {
            let mine = metric(me);
            1 + accounts
                .iter()
                .filter(|a| {
                    by_metric_desc(&metric(a), &mine, a, me) == Ordering::Less
                })
                .count()
        };

        Ok(UserPosition {
            user: PositionFigures {
                user_id: me.id.clone(),
                username: me.username.clone(),
                total_profit: me.stats.total_profit,
                profit_24h: profit_of(me),
                total_bets: me.stats.total_bets,
                win_rate: me.stats.win_rate(),
            },
            positions: Positions {
                profit_24h: rank(&profit_of),
                all_time: rank(&|a: &Account| a.stats.total_profit),
            },
        })
    }

    async fn profits_24h(&self) -> ServiceResult<HashMap<String, Decimal>> {
        let since = Utc::now() - Duration::hours(24);
        let mut profits: HashMap<String, Decimal> = HashMap::new();
        for game in self.store.games_since(since).await? {
            *profits.entry(game.user_id).or_insert(Decimal::ZERO) += game.profit;
        }
        Ok(profits)
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Higher metric first, then username ascending.
fn by_metric_desc<T: Ord>(ma: &T, mb: &T, a: &Account, b: &Account) -> Ordering {
    mb.cmp(ma).then_with(|| a.username.cmp(&b.username))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
