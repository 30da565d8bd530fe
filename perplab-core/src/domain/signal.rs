//! Per-candle output of the signal generator.

use serde::{Deserialize, Serialize};

/// Trade direction proposed by a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    #[default]
    None,
}

impl Direction {
    pub fn is_none(&self) -> bool {
        matches!(self, Direction::None)
    }
}

/// Indicator values the generator looked at when it produced a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub trend_strength: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub volume_ratio: f64,
    pub volatility: f64,
    pub atr: f64,
    pub last_close: f64,
}

/// Signal produced for one candle index.
///
/// Ephemeral: discarded unless the risk manager turns it into a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Clipped to [0, 1].
    pub confidence: f64,
    /// Clipped to [0, 1].
    pub strength: f64,
    pub strategy_id: String,
    pub expected_return: Option<f64>,
    pub indicators: IndicatorSnapshot,
}

impl Signal {
    /// A `None`-direction signal carrying the snapshot that was evaluated.
    pub fn none(strategy_id: impl Into<String>, indicators: IndicatorSnapshot) -> Self {
        Self {
            direction: Direction::None,
            confidence: 0.0,
            strength: 0.0,
            strategy_id: strategy_id.into(),
            expected_return: None,
            indicators,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !self.direction.is_none()
    }
}
