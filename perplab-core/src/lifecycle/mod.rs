//! Position lifecycle: `Flat → Open → (PartiallyClosed)* → Flat`.
//!
//! Owns the single optional position. Each candle runs exit evaluation,
//! applies at most one (partial) close, then ratchets the trailing stop at
//! the close. Invariants are asserted: a second open position or a
//! remaining size outside (0, 1] is a programming error.

pub mod exits;
pub mod ratchet;

pub use exits::{evaluate_exit, return_rate, ExitDecision, ExitInputs, ExitRules};
pub use ratchet::RatchetState;

use crate::domain::{AccountState, Candle, CloseReason, Position, Side, Trade, TrailingStop, SIZE_EPSILON};
use crate::risk::ExecutionPlan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Flat,
    Open,
    PartiallyClosed,
}

impl From<ExecutionPlan> for Position {
    fn from(plan: ExecutionPlan) -> Self {
        let trailing = plan.trailing.map(|cfg| TrailingStop::new(cfg, plan.side));
        Position {
            side: plan.side,
            entry_price: plan.entry_price,
            entry_index: plan.entry_index,
            entry_time: plan.entry_time,
            notional: plan.notional,
            margin: plan.margin,
            leverage: plan.leverage,
            remaining: 1.0,
            stop_loss: RatchetState::with_level(plan.side, plan.stop_loss),
            take_profits: plan.take_profits,
            next_take_profit: 0,
            trailing,
            max_holding_candles: plan.max_holding_candles,
            breakeven_after_first_tp: plan.breakeven_after_first_tp,
            strategy_id: plan.strategy_id,
            confidence: plan.confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    rules: ExitRules,
    position: Option<Position>,
}

impl PositionLifecycle {
    pub fn new(rules: ExitRules) -> Self {
        Self { rules, position: None }
    }

    pub fn state(&self) -> LifecycleState {
        match &self.position {
            None => LifecycleState::Flat,
            Some(p) if p.next_take_profit == 0 && p.remaining >= 1.0 => LifecycleState::Open,
            Some(_) => LifecycleState::PartiallyClosed,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Fraction of the original size still open, or 0 when flat.
    pub fn remaining(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.remaining)
    }

    /// Open a position from a plan. Panics if one is already open.
    pub fn open(&mut self, plan: ExecutionPlan) -> &Position {
        assert!(
            self.position.is_none(),
            "attempted to open a second position while one is open"
        );
        self.position.insert(Position::from(plan))
    }

    /// Evaluate one candle against the open position.
    ///
    /// Returns the trade realized on this candle, if any. Does nothing when flat.
    pub fn on_candle(
        &mut self,
        index: usize,
        candle: &Candle,
        is_last: bool,
        account: &AccountState,
    ) -> Option<Trade> {
        let position = self.position.as_mut()?;

        let inputs = ExitInputs {
            index,
            candle,
            is_last,
            capital: account.capital,
            peak_capital: account.peak_capital,
        };
        let trade = evaluate_exit(position, &self.rules, &inputs)
            .map(|decision| apply_exit(position, decision, index, candle, self.rules.fee_rate));

        if position.is_closed() {
            self.position = None;
        } else {
            update_trailing(position, candle.close);
            assert!(
                position.remaining > SIZE_EPSILON && position.remaining <= 1.0,
                "remaining size {} outside (0, 1]",
                position.remaining
            );
        }

        trade
    }
}

/// Close the decided slice and advance the ladder.
fn apply_exit(position: &mut Position, decision: ExitDecision, index: usize, candle: &Candle, fee_rate: f64) -> Trade {
    let fraction = match decision.fraction {
        Some(f) => position.reduce(f),
        None => position.reduce_all(),
    };

    if let CloseReason::TakeProfit(level) = decision.reason {
        position.next_take_profit = level + 1;
        if level == 0 && position.breakeven_after_first_tp {
            position.stop_loss.apply(position.entry_price);
        }
    }

    let return_rate = return_rate(position, decision.price, fee_rate);
    let margin = position.margin * fraction;
    let notional = position.notional * fraction;

    Trade {
        side: position.side,
        entry_index: position.entry_index,
        entry_time: position.entry_time,
        entry_price: position.entry_price,
        exit_index: index,
        exit_time: candle.timestamp,
        exit_price: decision.price,
        close_fraction: fraction,
        notional,
        margin,
        leverage: position.leverage,
        return_rate,
        fees: notional * 2.0 * fee_rate,
        pnl: margin * return_rate,
        close_reason: decision.reason,
        holding_secs: (candle.timestamp - position.entry_time).num_seconds(),
        candles_held: position.candles_held(index),
        strategy_id: position.strategy_id.clone(),
    }
}

/// Arm or ratchet the trailing stop from the candle close.
fn update_trailing(position: &mut Position, close: f64) {
    let profit = position.price_return(close);
    let (side, entry) = (position.side, position.entry_price);
    let Some(trailing) = position.trailing.as_mut() else {
        return;
    };
    if profit < trailing.config.activation {
        return;
    }

    let mut candidate = close * (1.0 - side.sign() * trailing.config.distance);
    if trailing.config.lock_breakeven {
        candidate = match side {
            Side::Long => candidate.max(entry),
            Side::Short => candidate.min(entry),
        };
    }
    trailing.ratchet.apply(candidate);
}
