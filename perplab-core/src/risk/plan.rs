//! Sizing outputs: the execution plan or the reason no trade was taken.

use crate::config::TrailingConfig;
use crate::domain::{Side, TakeProfitTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where and when an entry would fill, plus the market state behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub atr: f64,
    pub volatility: f64,
}

/// Concrete parameters for opening one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub side: Side,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub leverage: f64,
    /// Share of capital committed as margin.
    pub size_fraction: f64,
    pub margin: f64,
    pub notional: f64,
    pub stop_loss: f64,
    pub take_profits: Vec<TakeProfitTarget>,
    pub trailing: Option<TrailingConfig>,
    pub max_holding_candles: Option<usize>,
    pub breakeven_after_first_tp: bool,
    pub confidence: f64,
    pub strategy_id: String,
    /// Sized under the reduce-risk regime.
    pub reduced_risk: bool,
}

/// Why the risk manager refused a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeclineReason {
    NoDirection,
    LowConfidence { confidence: f64, min: f64 },
    DailyCap { trades: u32 },
    HourlyCap { trades: u32 },
    Drawdown { drawdown: f64 },
    NoStopDistance,
    NoCapital,
}

impl DeclineReason {
    pub fn label(&self) -> &'static str {
        match self {
            DeclineReason::NoDirection => "no_direction",
            DeclineReason::LowConfidence { .. } => "low_confidence",
            DeclineReason::DailyCap { .. } => "daily_cap",
            DeclineReason::HourlyCap { .. } => "hourly_cap",
            DeclineReason::Drawdown { .. } => "drawdown",
            DeclineReason::NoStopDistance => "no_stop_distance",
            DeclineReason::NoCapital => "no_capital",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizingOutcome {
    Trade(ExecutionPlan),
    Declined(DeclineReason),
}
