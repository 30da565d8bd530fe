//! Engine configuration.
//!
//! One immutable `EngineConfig` is passed to `Engine::new` and validated there.
//! Every field has a serde default equal to the balanced preset, so partial TOML
//! files only need to name what they change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration invariant violations, raised at engine construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("take-profit ladder is empty")]
    EmptyLadder,

    #[error("take-profit close fractions sum to {sum}, must be <= 1.0")]
    LadderOverallocated { sum: f64 },

    #[error("take-profit level {index}: offset {offset} must be > 0 and ascending")]
    LadderOffset { index: usize, offset: f64 },

    #[error("take-profit level {index}: close fraction {fraction} must be in (0, 1]")]
    LadderFraction { index: usize, fraction: f64 },

    #[error("min leverage {min} exceeds max leverage {max}")]
    LeverageRange { min: f64, max: f64 },

    #[error("base leverage {base} outside [{min}, {max}]")]
    BaseLeverage { base: f64, min: f64, max: f64 },

    #[error("size range invalid: min {min}, base {base}, max {max} (need 0 < min <= base <= max <= 1)")]
    SizeRange { min: f64, base: f64, max: f64 },

    #[error("RSI band {name} [{low}, {high}] invalid")]
    RsiBand { name: &'static str, low: f64, high: f64 },

    #[error("confidence weights must be non-negative and not all zero")]
    Weights,

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be in [0, 1], got {value}")]
    OutOfUnit { field: &'static str, value: f64 },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall { field: &'static str, value: usize, min: usize },

    #[error("maintenance margin {value} must be in [0, 1)")]
    MaintenanceMargin { value: f64 },

    #[error("MACD fast period {fast} must be below slow period {slow}")]
    MacdPeriods { fast: usize, slow: usize },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Fee per side as a fraction of notional.
    pub fee_rate: f64,
    /// Candles skipped before the first entry decision. The signal source's
    /// `min_history` applies as well; the larger of the two wins.
    pub warmup_candles: usize,
    /// Append an equity point every N candles (and on the final candle).
    pub equity_sample_every: usize,
    /// Annual risk-free rate for the Sharpe ratio.
    pub risk_free_rate: f64,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub exits: ExitConfig,
    pub breakers: BreakerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            fee_rate: 0.0004,
            warmup_candles: 0,
            equity_sample_every: 1,
            risk_free_rate: 0.0,
            signal: SignalConfig::default(),
            risk: RiskConfig::default(),
            exits: ExitConfig::default(),
            breakers: BreakerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check every invariant; the engine refuses to start otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_capital", self.initial_capital)?;
        unit("fee_rate", self.fee_rate)?;
        if self.equity_sample_every == 0 {
            return Err(ConfigError::TooSmall {
                field: "equity_sample_every",
                value: 0,
                min: 1,
            });
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::NonPositive {
                field: "risk_free_rate",
                value: self.risk_free_rate,
            });
        }
        self.signal.validate()?;
        self.risk.validate()?;
        self.exits.validate()?;
        self.breakers.validate()?;
        Ok(())
    }
}

/// Strategy profile: thresholds and weights of the signal generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub strategy_id: String,
    /// Candles required before any direction is emitted.
    pub min_history: usize,
    pub trend_lookback: usize,
    /// Minimum |trend strength| for a directional signal.
    pub trend_threshold: f64,
    /// Trend strength that maps to a full trend score.
    pub trend_scale: f64,
    pub rsi_period: usize,
    pub rsi_long_band: (f64, f64),
    pub rsi_short_band: (f64, f64),
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_short: usize,
    pub volume_long: usize,
    /// Volume-ratio excess over 1 that maps to a full volume score.
    pub volume_excess_scale: f64,
    pub volatility_period: usize,
    pub atr_period: usize,
    pub weight_trend: f64,
    pub weight_rsi: f64,
    pub weight_volume: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            strategy_id: "balanced".into(),
            min_history: 35,
            trend_lookback: 20,
            trend_threshold: 0.01,
            trend_scale: 0.05,
            rsi_period: 14,
            rsi_long_band: (50.0, 75.0),
            rsi_short_band: (25.0, 50.0),
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_short: 5,
            volume_long: 20,
            volume_excess_scale: 1.0,
            volatility_period: 20,
            atr_period: 14,
            weight_trend: 0.5,
            weight_rsi: 0.3,
            weight_volume: 0.2,
        }
    }
}

impl SignalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        at_least("signal.min_history", self.min_history, 2)?;
        at_least("signal.trend_lookback", self.trend_lookback, 2)?;
        at_least("signal.rsi_period", self.rsi_period, 1)?;
        at_least("signal.macd_fast", self.macd_fast, 1)?;
        at_least("signal.macd_signal", self.macd_signal, 1)?;
        at_least("signal.volume_short", self.volume_short, 1)?;
        at_least("signal.volume_long", self.volume_long, self.volume_short)?;
        at_least("signal.volatility_period", self.volatility_period, 1)?;
        at_least("signal.atr_period", self.atr_period, 1)?;
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::MacdPeriods {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }
        non_negative("signal.trend_threshold", self.trend_threshold)?;
        positive("signal.trend_scale", self.trend_scale)?;
        positive("signal.volume_excess_scale", self.volume_excess_scale)?;
        rsi_band("rsi_long_band", self.rsi_long_band)?;
        rsi_band("rsi_short_band", self.rsi_short_band)?;

        let weights = [self.weight_trend, self.weight_rsi, self.weight_volume];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Weights);
        }
        Ok(())
    }
}

/// What to do once realized drawdown exceeds `reduce_risk_drawdown`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReduceRisk {
    /// Refuse new entries.
    Decline,
    /// Multiply size and leverage by the given factors, then clamp.
    Shrink { size_factor: f64, leverage_factor: f64 },
}

/// Leverage and size rules of the risk & sizing manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub min_confidence: f64,
    /// Confidence above which leverage steps up one tier.
    pub high_confidence: f64,
    /// Volatility above which leverage steps down one tier.
    pub high_volatility: f64,
    pub base_leverage: f64,
    pub leverage_step: f64,
    pub min_leverage: f64,
    pub max_leverage: f64,
    pub base_size: f64,
    pub min_size: f64,
    pub max_size: f64,
    /// Consecutive wins needed for the size boost.
    pub win_streak: u32,
    pub win_boost: f64,
    /// Size reduction after a losing trade.
    pub loss_cut: f64,
    pub max_trades_per_day: u32,
    pub max_trades_per_hour: u32,
    pub reduce_risk_drawdown: f64,
    pub reduce_risk: ReduceRisk,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            high_confidence: 0.8,
            high_volatility: 0.03,
            base_leverage: 3.0,
            leverage_step: 1.0,
            min_leverage: 1.0,
            max_leverage: 10.0,
            base_size: 0.1,
            min_size: 0.01,
            max_size: 0.25,
            win_streak: 3,
            win_boost: 0.1,
            loss_cut: 0.2,
            max_trades_per_day: 10,
            max_trades_per_hour: 3,
            reduce_risk_drawdown: 0.1,
            reduce_risk: ReduceRisk::Shrink {
                size_factor: 0.5,
                leverage_factor: 0.5,
            },
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        unit("risk.min_confidence", self.min_confidence)?;
        unit("risk.high_confidence", self.high_confidence)?;
        non_negative("risk.high_volatility", self.high_volatility)?;
        non_negative("risk.leverage_step", self.leverage_step)?;
        positive("risk.min_leverage", self.min_leverage)?;
        if !(self.min_leverage <= self.max_leverage) {
            return Err(ConfigError::LeverageRange {
                min: self.min_leverage,
                max: self.max_leverage,
            });
        }
        if !(self.min_leverage <= self.base_leverage && self.base_leverage <= self.max_leverage) {
            return Err(ConfigError::BaseLeverage {
                base: self.base_leverage,
                min: self.min_leverage,
                max: self.max_leverage,
            });
        }
        let sizes_ok = self.min_size > 0.0
            && self.min_size <= self.base_size
            && self.base_size <= self.max_size
            && self.max_size <= 1.0;
        if !sizes_ok {
            return Err(ConfigError::SizeRange {
                min: self.min_size,
                base: self.base_size,
                max: self.max_size,
            });
        }
        non_negative("risk.win_boost", self.win_boost)?;
        unit("risk.loss_cut", self.loss_cut)?;
        unit("risk.reduce_risk_drawdown", self.reduce_risk_drawdown)?;
        if let ReduceRisk::Shrink {
            size_factor,
            leverage_factor,
        } = self.reduce_risk
        {
            positive("risk.reduce_risk.size_factor", size_factor)?;
            positive("risk.reduce_risk.leverage_factor", leverage_factor)?;
        }
        Ok(())
    }
}

/// Stop-loss distance rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossRule {
    /// Fixed fraction of entry price.
    Fixed { fraction: f64 },
    /// ATR / entry price × multiplier.
    Atr { multiplier: f64 },
}

/// One take-profit rung: price offset from entry and the share of the
/// original position it closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    pub offset: f64,
    pub close_fraction: f64,
}

/// Trailing-stop parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingConfig {
    /// Unrealized price return at the close that arms the trailing stop.
    pub activation: f64,
    /// Distance from the close, as a fraction of price.
    pub distance: f64,
    /// Never place the trailing stop behind the entry price.
    #[serde(default)]
    pub lock_breakeven: bool,
}

/// Exit rules of the position lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub stop_loss: StopLossRule,
    pub max_stop_distance: f64,
    pub take_profits: Vec<TakeProfitLevel>,
    pub trailing: Option<TrailingConfig>,
    pub max_holding_candles: Option<usize>,
    pub breakeven_after_first_tp: bool,
    /// Liquidation triggers at an adverse move of (1 − maintenance_margin) / leverage.
    pub maintenance_margin: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            stop_loss: StopLossRule::Fixed { fraction: 0.02 },
            max_stop_distance: 0.05,
            take_profits: vec![
                TakeProfitLevel {
                    offset: 0.02,
                    close_fraction: 0.5,
                },
                TakeProfitLevel {
                    offset: 0.04,
                    close_fraction: 0.3,
                },
                TakeProfitLevel {
                    offset: 0.06,
                    close_fraction: 0.2,
                },
            ],
            trailing: Some(TrailingConfig {
                activation: 0.015,
                distance: 0.01,
                lock_breakeven: true,
            }),
            max_holding_candles: Some(48),
            breakeven_after_first_tp: true,
            maintenance_margin: 0.005,
        }
    }
}

impl ExitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.stop_loss {
            StopLossRule::Fixed { fraction } => positive("exits.stop_loss.fraction", fraction)?,
            StopLossRule::Atr { multiplier } => positive("exits.stop_loss.multiplier", multiplier)?,
        }
        positive("exits.max_stop_distance", self.max_stop_distance)?;
        // 1.0 would put the liquidation price on the entry price
        if !(0.0..1.0).contains(&self.maintenance_margin) {
            return Err(ConfigError::MaintenanceMargin {
                value: self.maintenance_margin,
            });
        }

        if self.take_profits.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        let mut prev_offset = 0.0;
        let mut sum = 0.0;
        for (index, level) in self.take_profits.iter().enumerate() {
            if !(level.offset > prev_offset) || !level.offset.is_finite() {
                return Err(ConfigError::LadderOffset {
                    index,
                    offset: level.offset,
                });
            }
            if !(level.close_fraction > 0.0 && level.close_fraction <= 1.0) {
                return Err(ConfigError::LadderFraction {
                    index,
                    fraction: level.close_fraction,
                });
            }
            prev_offset = level.offset;
            sum += level.close_fraction;
        }
        if sum > 1.0 + 1e-9 {
            return Err(ConfigError::LadderOverallocated { sum });
        }

        if let Some(trailing) = &self.trailing {
            non_negative("exits.trailing.activation", trailing.activation)?;
            positive("exits.trailing.distance", trailing.distance)?;
            if trailing.distance >= 1.0 {
                return Err(ConfigError::OutOfUnit {
                    field: "exits.trailing.distance",
                    value: trailing.distance,
                });
            }
        }
        if let Some(max) = self.max_holding_candles {
            at_least("exits.max_holding_candles", max, 1)?;
        }
        Ok(())
    }
}

/// When the max-drawdown breaker lets entries resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerReset {
    Permanent,
    NextDay,
}

/// Circuit-breaker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Realized drawdown that suspends entries.
    pub max_drawdown: f64,
    pub max_drawdown_reset: BreakerReset,
    /// Loss versus day-start capital that suspends entries until the next UTC day.
    pub daily_loss_limit: f64,
    /// Mark-to-market drawdown at the close that force-closes the open position.
    pub emergency_drawdown: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_drawdown: 0.25,
            max_drawdown_reset: BreakerReset::Permanent,
            daily_loss_limit: 0.05,
            emergency_drawdown: 0.3,
        }
    }
}

impl BreakerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        unit("breakers.max_drawdown", self.max_drawdown)?;
        unit("breakers.daily_loss_limit", self.daily_loss_limit)?;
        unit("breakers.emergency_drawdown", self.emergency_drawdown)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnit { field, value })
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, value, min })
    }
}

fn rsi_band(name: &'static str, (low, high): (f64, f64)) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&low) && (0.0..=100.0).contains(&high) && low < high {
        Ok(())
    } else {
        Err(ConfigError::RsiBand { name, low, high })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_overallocated_ladder() {
        let mut cfg = EngineConfig::default();
        cfg.exits.take_profits = vec![
            TakeProfitLevel {
                offset: 0.02,
                close_fraction: 0.7,
            },
            TakeProfitLevel {
                offset: 0.04,
                close_fraction: 0.5,
            },
        ];
        assert!(matches!(cfg.validate(), Err(ConfigError::LadderOverallocated { .. })));
    }

    #[test]
    fn rejects_empty_ladder() {
        let mut cfg = EngineConfig::default();
        cfg.exits.take_profits.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyLadder));
    }

    #[test]
    fn rejects_descending_offsets() {
        let mut cfg = EngineConfig::default();
        cfg.exits.take_profits.swap(0, 1);
        assert!(matches!(cfg.validate(), Err(ConfigError::LadderOffset { index: 1, .. })));
    }

    #[test]
    fn rejects_inverted_leverage_range() {
        let mut cfg = EngineConfig::default();
        cfg.risk.min_leverage = 5.0;
        cfg.risk.max_leverage = 2.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::LeverageRange { .. })));
    }

    #[test]
    fn rejects_base_leverage_outside_range() {
        let mut cfg = EngineConfig::default();
        cfg.risk.base_leverage = 20.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BaseLeverage { .. })));
    }

    #[test]
    fn rejects_full_maintenance_margin() {
        let mut cfg = EngineConfig::default();
        cfg.exits.maintenance_margin = 1.0;
        assert_eq!(cfg.validate(), Err(ConfigError::MaintenanceMargin { value: 1.0 }));
        cfg.exits.maintenance_margin = -0.01;
        assert!(matches!(cfg.validate(), Err(ConfigError::MaintenanceMargin { .. })));
        cfg.exits.maintenance_margin = 0.0;
        assert_eq!(cfg.validate(), Ok(()));
        cfg.exits.maintenance_margin = 0.99;
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_sampling_cadence() {
        let mut cfg = EngineConfig::default();
        cfg.equity_sample_every = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::TooSmall { .. })));
    }

    #[test]
    fn rejects_inverted_rsi_band() {
        let mut cfg = EngineConfig::default();
        cfg.signal.rsi_long_band = (70.0, 40.0);
        assert!(matches!(cfg.validate(), Err(ConfigError::RsiBand { .. })));
    }

    #[test]
    fn rejects_zero_weights() {
        let mut cfg = EngineConfig::default();
        cfg.signal.weight_trend = 0.0;
        cfg.signal.weight_rsi = 0.0;
        cfg.signal.weight_volume = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::Weights));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "initial_capital": 500.0, "risk": { "base_leverage": 2.0 } }"#)
                .unwrap();
        assert_eq!(cfg.initial_capital, 500.0);
        assert_eq!(cfg.risk.base_leverage, 2.0);
        assert_eq!(cfg.risk.max_leverage, RiskConfig::default().max_leverage);
        assert_eq!(cfg.exits, ExitConfig::default());
    }

    #[test]
    fn reduce_risk_tagged_serde() {
        let json = serde_json::to_string(&ReduceRisk::Decline).unwrap();
        assert_eq!(json, r#"{"mode":"decline"}"#);
        let back: ReduceRisk =
            serde_json::from_str(r#"{"mode":"shrink","size_factor":0.5,"leverage_factor":0.8}"#).unwrap();
        assert_eq!(
            back,
            ReduceRisk::Shrink {
                size_factor: 0.5,
                leverage_factor: 0.8
            }
        );
    }
}
