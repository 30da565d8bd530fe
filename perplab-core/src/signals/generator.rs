//! Threshold-rule signal generator driven by a `SignalConfig` profile.

use super::{PreparedSignals, SignalSource};
use crate::config::SignalConfig;
use crate::domain::{Candle, Direction, IndicatorSnapshot, Signal};
use crate::indicators::{
    self, atr_series, macd, macd_series, rsi, rsi_series, trend_strength, volatility, volume_ratio, Macd, RSI_NEUTRAL,
};

/// Histogram / close below this magnitude counts as flat, not opposing.
const MACD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: SignalConfig,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Indicator values over the window. Neutral values during warm-up.
    pub fn snapshot(&self, window: &[Candle]) -> IndicatorSnapshot {
        let cfg = &self.config;
        let closes = indicators::closes(window);
        let volumes = indicators::volumes(window);

        IndicatorSnapshot {
            trend_strength: trend_strength(&closes, cfg.trend_lookback),
            rsi: rsi(&closes, cfg.rsi_period),
            macd_histogram: macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal).histogram,
            volume_ratio: volume_ratio(&volumes, cfg.volume_short, cfg.volume_long),
            volatility: volatility(&closes, cfg.volatility_period),
            atr: indicators::atr(window, cfg.atr_period),
            last_close: closes.last().copied().unwrap_or(0.0),
        }
    }

    /// `snapshots(candles)[i] == snapshot(&candles[..i])` for every `i`.
    ///
    /// Recursive indicators come from one pass over the series; the
    /// bounded-window ones are evaluated on trailing slices.
    pub fn snapshots(&self, candles: &[Candle]) -> Vec<IndicatorSnapshot> {
        let cfg = &self.config;
        let closes = indicators::closes(candles);
        let volumes = indicators::volumes(candles);
        let rsi_at = rsi_series(&closes, cfg.rsi_period);
        let macd_at = macd_series(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let atr_at = atr_series(candles, cfg.atr_period);

        (0..candles.len())
            .map(|i| {
                // Window `candles[..i]` ends at candle i - 1.
                let last = i.checked_sub(1);
                let prior = &closes[..i];
                IndicatorSnapshot {
                    trend_strength: trend_strength(prior, cfg.trend_lookback),
                    rsi: last.map_or(RSI_NEUTRAL, |k| rsi_at[k]),
                    macd_histogram: last.map_or(Macd::default(), |k| macd_at[k]).histogram,
                    volume_ratio: volume_ratio(&volumes[..i], cfg.volume_short, cfg.volume_long),
                    volatility: volatility(prior, cfg.volatility_period),
                    atr: last.map_or(0.0, |k| atr_at[k]),
                    last_close: prior.last().copied().unwrap_or(0.0),
                }
            })
            .collect()
    }

    /// Turn a snapshot over `history` candles into a signal.
    fn signal_from(&self, snap: IndicatorSnapshot, history: usize) -> Signal {
        if history < self.config.min_history {
            return Signal::none(&self.config.strategy_id, snap);
        }

        let direction = self.direction(&snap);
        if direction.is_none() {
            return Signal::none(&self.config.strategy_id, snap);
        }

        let sign = match direction {
            Direction::Long => 1.0,
            _ => -1.0,
        };
        Signal {
            direction,
            confidence: self.confidence(&snap, direction),
            strength: (snap.trend_strength.abs() / self.config.trend_scale).min(1.0),
            strategy_id: self.config.strategy_id.clone(),
            expected_return: Some(snap.trend_strength * sign),
            indicators: snap,
        }
    }

    fn direction(&self, snap: &IndicatorSnapshot) -> Direction {
        let cfg = &self.config;
        let hist = if snap.last_close > 0.0 {
            snap.macd_histogram / snap.last_close
        } else {
            0.0
        };
        let in_band = |(low, high): (f64, f64)| snap.rsi >= low && snap.rsi <= high;

        if snap.trend_strength > cfg.trend_threshold && in_band(cfg.rsi_long_band) && hist >= -MACD_TOLERANCE {
            Direction::Long
        } else if snap.trend_strength < -cfg.trend_threshold
            && in_band(cfg.rsi_short_band)
            && hist <= MACD_TOLERANCE
        {
            Direction::Short
        } else {
            Direction::None
        }
    }

    /// Weighted trend / RSI / volume score in [0, 1].
    fn confidence(&self, snap: &IndicatorSnapshot, direction: Direction) -> f64 {
        let cfg = &self.config;
        let (low, high) = match direction {
            Direction::Long => cfg.rsi_long_band,
            Direction::Short => cfg.rsi_short_band,
            Direction::None => return 0.0,
        };
        let centre = (low + high) / 2.0;
        let half_width = (high - low) / 2.0;

        let trend_score = (snap.trend_strength.abs() / cfg.trend_scale).min(1.0);
        let rsi_score = ((snap.rsi - centre).abs() / half_width).min(1.0);
        let volume_score = ((snap.volume_ratio - 1.0) / cfg.volume_excess_scale).clamp(0.0, 1.0);

        (cfg.weight_trend * trend_score + cfg.weight_rsi * rsi_score + cfg.weight_volume * volume_score)
            .clamp(0.0, 1.0)
    }
}

impl SignalSource for SignalGenerator {
    fn generate(&self, window: &[Candle]) -> Signal {
        self.signal_from(self.snapshot(window), window.len())
    }

    fn name(&self) -> &str {
        &self.config.strategy_id
    }

    fn min_history(&self) -> usize {
        self.config.min_history
    }

    fn prepare<'a>(&'a self, candles: &'a [Candle]) -> Box<dyn PreparedSignals + 'a> {
        Box::new(PrecomputedSignals {
            generator: self,
            snapshots: self.snapshots(candles),
        })
    }
}

/// Indicator snapshots for every decision index of one run.
#[derive(Debug)]
pub struct PrecomputedSignals<'a> {
    generator: &'a SignalGenerator,
    snapshots: Vec<IndicatorSnapshot>,
}

impl PreparedSignals for PrecomputedSignals<'_> {
    fn signal_at(&self, i: usize) -> Signal {
        let snap = self.snapshots.get(i).copied().unwrap_or_default();
        self.generator.signal_from(snap, i)
    }
}
