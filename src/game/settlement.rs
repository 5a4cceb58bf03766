//! Bet settlement engine.
//!
//! A pure function of (request, config, balance before) plus one die roll.
//! Validation runs first, in a fixed order, and fails before the die is
//! touched; the caller owns the balance and the aggregate counters.

use rust_decimal::Decimal;
use tracing::debug;

use super::DiceRoller;
use crate::config::GameConfig;
use crate::types::{BetError, BetOption, BetRequest, ServiceError, ServiceResult, SettlementResult};

/// A bet that passed every check and can be rolled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedBet {
    pub amount: Decimal,
    pub option: BetOption,
    pub multiplier: u32,
}

/// Check a raw request against the limits and the caller's balance.
///
/// Order: presence, min bet, max bet, multiplier range, option, balance.
pub fn validate(
    request: &BetRequest,
    config: &GameConfig,
    balance: Decimal,
) -> Result<ValidatedBet, BetError> {
    let (Some(amount), Some(raw_option), Some(multiplier)) =
        (request.bet_amount, request.bet_option.as_ref(), request.multiplier)
    else {
        return Err(BetError::MissingField);
    };

    let limits = &config.limits;
    if amount < limits.min_bet {
        return Err(BetError::BelowMinBet { min: limits.min_bet });
    }
    if amount > limits.max_bet {
        return Err(BetError::AboveMaxBet { max: limits.max_bet });
    }

    let multiplier = u32::try_from(multiplier)
        .ok()
        .filter(|m| (1..=limits.max_multiplier).contains(m))
        .ok_or(BetError::MultiplierOutOfRange {
            max: limits.max_multiplier,
        })?;

    let option = BetOption::try_from(raw_option)?;

    if balance < amount {
        return Err(BetError::InsufficientBalance {
            needed: amount,
            available: balance,
        });
    }

    Ok(ValidatedBet {
        amount,
        option,
        multiplier,
    })
}

/// Exact-number odds for face bets, small/large odds otherwise.
pub fn odds_for(option: BetOption, config: &GameConfig) -> Decimal {
    if option.is_exact() {
        config.odds.exact_number
    } else {
        config.odds.small_large
    }
}

pub fn is_win(option: BetOption, roll: u8) -> bool {
    match option {
        BetOption::Small => (1..=3).contains(&roll),
        BetOption::Large => (4..=6).contains(&roll),
        BetOption::Exact(face) => roll == face,
    }
}

/// Settle a validated bet against a known roll.
///
/// `None` when the payout or the new balance leaves the `Decimal` range.
pub fn settle_roll(
    bet: &ValidatedBet,
    config: &GameConfig,
    balance_before: Decimal,
    roll: u8,
) -> Option<SettlementResult> {
    let odds = odds_for(bet.option, config);
    let potential_win = bet
        .amount
        .checked_mul(odds)?
        .checked_mul(Decimal::from(bet.multiplier))?;
    let win = is_win(bet.option, roll);
    let profit = if win { potential_win } else { -bet.amount };

    Some(SettlementResult {
        dice_result: roll,
        win,
        profit,
        balance_before,
        balance_after: balance_before.checked_add(profit)?,
        bet_amount: bet.amount,
        bet_option: bet.option,
        multiplier: bet.multiplier,
        odds,
        potential_win,
    })
}

/// Validate, roll once, and settle.
pub fn settle<R: DiceRoller + ?Sized>(
    request: &BetRequest,
    config: &GameConfig,
    balance_before: Decimal,
    roller: &R,
) -> ServiceResult<SettlementResult> {
    let bet = match validate(request, config, balance_before) {
        Ok(bet) => bet,
        Err(e) => {
            debug!(error = %e, "Bet rejected");
            return Err(e.into());
        }
    };
    let roll = roller.roll();
    settle_roll(&bet, config, balance_before, roll).ok_or_else(|| {
        ServiceError::Internal(format!(
            "settlement overflow: {} x {} x {}",
            bet.amount,
            odds_for(bet.option, config),
            bet.multiplier
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
