//! Named strategy presets.
//!
//! A preset is only a value of `EngineConfig`; every strategy runs through the
//! same engine. `balanced` equals `EngineConfig::default()`.

use crate::config::{
    BreakerConfig, BreakerReset, EngineConfig, ExitConfig, ReduceRisk, RiskConfig, SignalConfig, StopLossRule,
    TakeProfitLevel, TrailingConfig,
};

pub const PRESET_NAMES: [&str; 4] = ["conservative", "balanced", "aggressive", "scalper"];

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<EngineConfig> {
    match name {
        "conservative" => Some(conservative()),
        "balanced" => Some(balanced()),
        "aggressive" => Some(aggressive()),
        "scalper" => Some(scalper()),
        _ => None,
    }
}

fn ladder(levels: &[(f64, f64)]) -> Vec<TakeProfitLevel> {
    levels
        .iter()
        .map(|&(offset, close_fraction)| TakeProfitLevel {
            offset,
            close_fraction,
        })
        .collect()
}

pub fn balanced() -> EngineConfig {
    EngineConfig::default()
}

/// Low leverage, tight stops, declines entries once in drawdown.
pub fn conservative() -> EngineConfig {
    EngineConfig {
        signal: SignalConfig {
            strategy_id: "conservative".into(),
            trend_threshold: 0.015,
            rsi_long_band: (50.0, 70.0),
            rsi_short_band: (30.0, 50.0),
            ..SignalConfig::default()
        },
        risk: RiskConfig {
            min_confidence: 0.7,
            high_confidence: 0.85,
            high_volatility: 0.02,
            base_leverage: 2.0,
            min_leverage: 1.0,
            max_leverage: 3.0,
            base_size: 0.05,
            min_size: 0.01,
            max_size: 0.1,
            max_trades_per_day: 5,
            max_trades_per_hour: 2,
            reduce_risk_drawdown: 0.08,
            reduce_risk: ReduceRisk::Decline,
            ..RiskConfig::default()
        },
        exits: ExitConfig {
            stop_loss: StopLossRule::Fixed { fraction: 0.015 },
            max_stop_distance: 0.03,
            take_profits: ladder(&[(0.015, 0.5), (0.03, 0.5)]),
            trailing: Some(TrailingConfig {
                activation: 0.01,
                distance: 0.008,
                lock_breakeven: true,
            }),
            max_holding_candles: Some(24),
            ..ExitConfig::default()
        },
        breakers: BreakerConfig {
            max_drawdown: 0.15,
            max_drawdown_reset: BreakerReset::Permanent,
            daily_loss_limit: 0.03,
            emergency_drawdown: 0.2,
        },
        ..EngineConfig::default()
    }
}

/// Higher leverage and size, ATR-scaled stops, wider ladder.
pub fn aggressive() -> EngineConfig {
    EngineConfig {
        signal: SignalConfig {
            strategy_id: "aggressive".into(),
            trend_threshold: 0.008,
            rsi_long_band: (50.0, 80.0),
            rsi_short_band: (20.0, 50.0),
            weight_trend: 0.6,
            weight_rsi: 0.2,
            weight_volume: 0.2,
            ..SignalConfig::default()
        },
        risk: RiskConfig {
            min_confidence: 0.55,
            high_confidence: 0.75,
            high_volatility: 0.04,
            base_leverage: 5.0,
            leverage_step: 2.0,
            min_leverage: 2.0,
            max_leverage: 15.0,
            base_size: 0.15,
            min_size: 0.02,
            max_size: 0.3,
            win_boost: 0.2,
            max_trades_per_day: 20,
            max_trades_per_hour: 4,
            reduce_risk_drawdown: 0.15,
            ..RiskConfig::default()
        },
        exits: ExitConfig {
            stop_loss: StopLossRule::Atr { multiplier: 2.0 },
            max_stop_distance: 0.04,
            take_profits: ladder(&[(0.03, 0.4), (0.06, 0.3), (0.1, 0.3)]),
            trailing: Some(TrailingConfig {
                activation: 0.02,
                distance: 0.015,
                lock_breakeven: true,
            }),
            max_holding_candles: Some(96),
            ..ExitConfig::default()
        },
        breakers: BreakerConfig {
            max_drawdown: 0.35,
            max_drawdown_reset: BreakerReset::NextDay,
            daily_loss_limit: 0.08,
            emergency_drawdown: 0.4,
        },
        ..EngineConfig::default()
    }
}

/// Short windows, small targets, many trades per hour.
pub fn scalper() -> EngineConfig {
    EngineConfig {
        signal: SignalConfig {
            strategy_id: "scalper".into(),
            min_history: 20,
            trend_lookback: 10,
            trend_threshold: 0.003,
            trend_scale: 0.02,
            rsi_period: 7,
            macd_fast: 6,
            macd_slow: 13,
            macd_signal: 5,
            volume_short: 3,
            volume_long: 12,
            volatility_period: 10,
            atr_period: 7,
            weight_trend: 0.4,
            weight_rsi: 0.3,
            weight_volume: 0.3,
            ..SignalConfig::default()
        },
        risk: RiskConfig {
            base_leverage: 5.0,
            min_leverage: 3.0,
            max_leverage: 10.0,
            high_volatility: 0.01,
            base_size: 0.08,
            max_size: 0.15,
            max_trades_per_day: 40,
            max_trades_per_hour: 6,
            ..RiskConfig::default()
        },
        exits: ExitConfig {
            stop_loss: StopLossRule::Fixed { fraction: 0.005 },
            max_stop_distance: 0.01,
            take_profits: ladder(&[(0.004, 0.6), (0.008, 0.4)]),
            trailing: Some(TrailingConfig {
                activation: 0.003,
                distance: 0.002,
                lock_breakeven: true,
            }),
            max_holding_candles: Some(12),
            ..ExitConfig::default()
        },
        ..EngineConfig::default()
    }
}
