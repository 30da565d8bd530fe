//! The single open leveraged position the engine may hold.

use crate::config::TrailingConfig;
use crate::lifecycle::ratchet::RatchetState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining-size values at or below this are treated as fully closed.
pub const SIZE_EPSILON: f64 = 1e-9;

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// True if `a` is more favourable than `b` for this side.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Side::Long => a > b,
            Side::Short => a < b,
        }
    }
}

/// One rung of the take-profit ladder, resolved to a price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTarget {
    pub price: f64,
    /// Fraction of the original position closed at this level.
    pub close_fraction: f64,
}

/// Trailing stop: parameters plus the ratcheted level (None until armed).
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    pub config: TrailingConfig,
    pub ratchet: RatchetState,
}

impl TrailingStop {
    pub fn new(config: TrailingConfig, side: Side) -> Self {
        Self {
            config,
            ratchet: RatchetState::new(side),
        }
    }

    pub fn level(&self) -> Option<f64> {
        self.ratchet.current_level()
    }
}

/// Open leveraged position.
///
/// Created from an `ExecutionPlan` when the engine is flat, mutated in place by
/// partial closes and stop ratchets, dropped when `remaining` reaches zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    /// Leveraged exposure at entry (margin × leverage).
    pub notional: f64,
    /// Capital committed at entry.
    pub margin: f64,
    pub leverage: f64,
    /// Fraction of the original size still open, in (0, 1].
    pub remaining: f64,
    pub stop_loss: RatchetState,
    pub take_profits: Vec<TakeProfitTarget>,
    /// Index of the first take-profit level not yet consumed.
    pub next_take_profit: usize,
    pub trailing: Option<TrailingStop>,
    pub max_holding_candles: Option<usize>,
    pub breakeven_after_first_tp: bool,
    pub strategy_id: String,
    pub confidence: f64,
}

impl Position {
    /// Price move in the position's favour as a fraction of entry (unleveraged).
    pub fn price_return(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * self.side.sign()
    }

    pub fn stop_loss_price(&self) -> f64 {
        self.stop_loss
            .current_level()
            .expect("stop loss is initialised at entry")
    }

    pub fn next_target(&self) -> Option<&TakeProfitTarget> {
        self.take_profits.get(self.next_take_profit)
    }

    /// Candles held as of `index`.
    pub fn candles_held(&self, index: usize) -> usize {
        index.saturating_sub(self.entry_index)
    }

    /// Shrink the open size by `fraction` of the original, returning the fraction
    /// actually closed (capped at what remains). Snaps dust to exactly zero.
    pub fn reduce(&mut self, fraction: f64) -> f64 {
        let closed = fraction.min(self.remaining);
        self.remaining -= closed;
        if self.remaining <= SIZE_EPSILON {
            self.remaining = 0.0;
        }
        closed
    }

    /// Close everything still open, returning that fraction.
    pub fn reduce_all(&mut self) -> f64 {
        let closed = self.remaining;
        self.remaining = 0.0;
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.remaining == 0.0
    }
}
