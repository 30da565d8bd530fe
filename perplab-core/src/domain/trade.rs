//! Immutable record of a full or partial position close.

use super::position::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why (part of) a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Adverse move consumed the maintenance margin.
    Liquidation,
    /// Mark-to-market drawdown breached the emergency threshold.
    EmergencyDrawdown,
    /// Candle sequence ended with the position open.
    EndOfData,
    StopLoss,
    TrailingStop,
    /// Take-profit ladder level (0-based).
    TakeProfit(usize),
    MaxHolding,
}

impl CloseReason {
    /// Stable label used in reports and CSV exports.
    pub fn label(&self) -> String {
        match self {
            Self::Liquidation => "LIQUIDATION".into(),
            Self::EmergencyDrawdown => "EMERGENCY_DRAWDOWN".into(),
            Self::EndOfData => "END_OF_DATA".into(),
            Self::StopLoss => "STOP_LOSS".into(),
            Self::TrailingStop => "TRAILING_STOP".into(),
            Self::TakeProfit(level) => format!("TAKE_PROFIT_{}", level + 1),
            Self::MaxHolding => "MAX_HOLDING".into(),
        }
    }
}

/// A realized (partial) close.
///
/// `return_rate` is the return on the margin of the closed slice:
/// price change × side sign × leverage − round-trip fees, floored at −1
/// (isolated margin cannot lose more than it posted). `pnl` = margin × return_rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    // ── Size ──
    /// Fraction of the original position this trade closed.
    pub close_fraction: f64,
    pub notional: f64,
    pub margin: f64,
    pub leverage: f64,

    // ── Result ──
    pub return_rate: f64,
    pub fees: f64,
    pub pnl: f64,
    pub close_reason: CloseReason,

    // ── Duration ──
    pub holding_secs: i64,
    pub candles_held: usize,

    pub strategy_id: String,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn holding_hours(&self) -> f64 {
        self.holding_secs as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> Trade {
        let entry_time = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        Trade {
            side: Side::Long,
            entry_index: 4,
            entry_time,
            entry_price: 100.0,
            exit_index: 8,
            exit_time: entry_time + chrono::Duration::hours(4),
            exit_price: 105.0,
            close_fraction: 1.0,
            notional: 2_000.0,
            margin: 1_000.0,
            leverage: 2.0,
            return_rate: 0.098,
            fees: 2.0,
            pnl: 98.0,
            close_reason: CloseReason::TakeProfit(0),
            holding_secs: 4 * 3600,
            candles_held: 4,
            strategy_id: "balanced".into(),
        }
    }

    #[test]
    fn is_winner() {
        assert!(sample_trade().is_winner());
        assert!(!sample_trade().is_loser());
    }

    #[test]
    fn holding_hours() {
        assert!((sample_trade().holding_hours() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn close_reason_labels() {
        assert_eq!(CloseReason::TakeProfit(0).label(), "TAKE_PROFIT_1");
        assert_eq!(CloseReason::EndOfData.label(), "END_OF_DATA");
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
