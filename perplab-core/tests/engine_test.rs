//! End-to-end engine scenarios.

use chrono::{DateTime, Duration, TimeZone, Utc};
use perplab_core::config::{
    BreakerConfig, ConfigError, EngineConfig, ExitConfig, RiskConfig, SignalConfig, StopLossRule, TakeProfitLevel,
};
use perplab_core::domain::{Candle, CloseReason, DataError, Direction, IndicatorSnapshot, Side, Signal};
use perplab_core::engine::{BreakerKind, Engine};
use perplab_core::signals::{PreparedSignals, SignalSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 100 one-minute candles, close rising linearly from 100 to 150, constant volume.
fn linear_uptrend() -> Vec<Candle> {
    let step = 50.0 / 99.0;
    (0..100)
        .map(|i| {
            let close = 100.0 + step * i as f64;
            let open = if i == 0 { close } else { close - step };
            Candle::new(t0() + Duration::minutes(i), open, close + 0.05, open - 0.05, close, 1_000.0)
        })
        .collect()
}

/// Hourly candles falling one point per candle.
fn hourly_decline(n: i64) -> Vec<Candle> {
    (0..n)
        .map(|k| {
            let open = 100.0 - k as f64;
            let close = open - 1.0;
            Candle::new(t0() + Duration::hours(k), open, open + 0.1, close - 0.1, close, 1_000.0)
        })
        .collect()
}

fn single_target(offset: f64) -> Vec<TakeProfitLevel> {
    vec![TakeProfitLevel {
        offset,
        close_fraction: 1.0,
    }]
}

/// Emits a full-confidence long whenever `fires(window_len)` holds.
struct Scripted<F: Fn(usize) -> bool + Send + Sync> {
    fires: F,
}

impl<F: Fn(usize) -> bool + Send + Sync> SignalSource for Scripted<F> {
    fn generate(&self, window: &[Candle]) -> Signal {
        let snapshot = IndicatorSnapshot::default();
        if (self.fires)(window.len()) {
            Signal {
                direction: Direction::Long,
                confidence: 1.0,
                strength: 1.0,
                strategy_id: "scripted".into(),
                expected_return: None,
                indicators: snapshot,
            }
        } else {
            Signal::none("scripted", snapshot)
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn min_history(&self) -> usize {
        0
    }
}

fn scripted(fires: impl Fn(usize) -> bool + Send + Sync + 'static) -> Box<dyn SignalSource> {
    Box::new(Scripted { fires })
}

/// Flat-leverage config for scripted-signal scenarios.
fn scripted_config() -> EngineConfig {
    EngineConfig {
        fee_rate: 0.0,
        risk: RiskConfig {
            base_leverage: 2.0,
            leverage_step: 0.0,
            max_trades_per_day: 100,
            max_trades_per_hour: 100,
            ..RiskConfig::default()
        },
        exits: ExitConfig {
            stop_loss: StopLossRule::Fixed { fraction: 0.02 },
            take_profits: single_target(0.5),
            trailing: None,
            max_holding_candles: None,
            breakeven_after_first_tp: false,
            ..ExitConfig::default()
        },
        ..EngineConfig::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn uptrend_opens_one_long_and_takes_profit() {
    let config = EngineConfig {
        fee_rate: 0.0,
        signal: SignalConfig {
            rsi_long_band: (50.0, 100.0),
            ..SignalConfig::default()
        },
        risk: RiskConfig {
            min_confidence: 0.5,
            high_confidence: 0.95,
            base_leverage: 2.0,
            max_trades_per_day: 1,
            ..RiskConfig::default()
        },
        exits: ExitConfig {
            stop_loss: StopLossRule::Fixed { fraction: 0.02 },
            take_profits: single_target(0.05),
            trailing: None,
            max_holding_candles: None,
            ..ExitConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = Engine::new(config).unwrap();
    let result = engine.run(&linear_uptrend()).unwrap();

    assert_eq!(result.trades.len(), 1, "trades: {:#?}", result.trades);
    let trade = &result.trades[0];
    assert_eq!(trade.side, Side::Long);
    assert_eq!(trade.close_reason, CloseReason::TakeProfit(0));
    assert_eq!(trade.close_fraction, 1.0);
    assert!(trade.entry_index <= 40, "entry at {}", trade.entry_index);
    assert!((trade.exit_price - trade.entry_price * 1.05).abs() < 1e-9);
    assert_eq!(trade.leverage, 2.0);
    assert!((trade.return_rate - 0.1).abs() < 1e-9);
    assert!((trade.pnl - trade.margin * 0.1).abs() < 1e-9);

    assert_eq!(result.metrics.total_trades, 1);
    assert_eq!(result.metrics.win_rate, 1.0);
    assert!(result.metrics.total_return > 0.0);
    assert_eq!(result.diagnostics.entries, 1);
    assert!(result.diagnostics.declines.get("daily_cap").copied().unwrap_or(0) > 0);
}

#[test]
fn open_position_is_closed_at_end_of_data() {
    let candles: Vec<Candle> = (0..10)
        .map(|i| {
            let close = if i == 9 { 101.0 } else { 100.0 };
            Candle::new(t0() + Duration::hours(i), 100.0, 101.2, 99.8, close, 500.0)
        })
        .collect();
    let n = candles.len();
    let engine = Engine::with_signal_source(scripted_config(), scripted(move |len| len == n - 2)).unwrap();
    let result = engine.run(&candles).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_index, n - 2);
    assert_eq!(trade.exit_index, n - 1);
    assert_eq!(trade.close_reason, CloseReason::EndOfData);
    assert_eq!(trade.exit_price, 101.0);
    assert_eq!(result.metrics.win_rate, 1.0);
    assert_eq!(result.metrics.exits_by_reason.get("END_OF_DATA"), Some(&1));
}

#[test]
fn losing_end_of_data_counts_as_loss() {
    let candles: Vec<Candle> = (0..10)
        .map(|i| {
            let close = if i == 9 { 99.5 } else { 100.0 };
            Candle::new(t0() + Duration::hours(i), 100.0, 100.2, 99.4, close, 500.0)
        })
        .collect();
    let engine = Engine::with_signal_source(scripted_config(), scripted(|len| len == 8)).unwrap();
    let result = engine.run(&candles).unwrap();

    assert_eq!(result.trades[0].close_reason, CloseReason::EndOfData);
    assert_eq!(result.metrics.win_rate, 0.0);
    assert_eq!(result.metrics.losing_trades, 1);
    assert_eq!(result.metrics.profit_factor, 0.0);
}

#[test]
fn no_entry_on_final_candle() {
    let candles = hourly_decline(5);
    let engine = Engine::with_signal_source(scripted_config(), scripted(|len| len == 4)).unwrap();
    let result = engine.run(&candles).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.diagnostics.entries, 0);
}

#[test]
fn daily_loss_breaker_pauses_until_next_day() {
    let mut config = scripted_config();
    config.breakers = BreakerConfig {
        daily_loss_limit: 0.01,
        ..BreakerConfig::default()
    };
    let engine = Engine::with_signal_source(config, scripted(|_| true)).unwrap();
    let result = engine.run(&hourly_decline(30)).unwrap();

    assert!(result.trades.iter().all(|t| t.close_reason == CloseReason::StopLoss || t.close_reason == CloseReason::EndOfData));
    let first_trip = &result.breaker_trips[0];
    assert_eq!(first_trip.kind, BreakerKind::DailyLoss);
    assert_eq!(first_trip.index, 3);

    let entries: Vec<usize> = result.trades.iter().map(|t| t.entry_index).collect();
    assert_eq!(&entries[..3], &[0, 1, 2]);
    assert_eq!(entries[3], 24, "entries resume on the next UTC day");
    assert!(entries.iter().all(|e| !(3..24).contains(e)));
    assert!(result.diagnostics.blocked_by_breakers >= 21);
}

#[test]
fn max_drawdown_breaker_is_permanent() {
    let mut config = scripted_config();
    config.breakers = BreakerConfig {
        max_drawdown: 0.01,
        daily_loss_limit: 1.0,
        ..BreakerConfig::default()
    };
    let engine = Engine::with_signal_source(config, scripted(|_| true)).unwrap();
    let result = engine.run(&hourly_decline(30)).unwrap();

    assert_eq!(result.trades.len(), 3);
    assert_eq!(result.breaker_trips.len(), 1);
    assert_eq!(result.breaker_trips[0].kind, BreakerKind::MaxDrawdown);
    assert!(result.final_account.drawdown() > 0.01);
}

#[test]
fn hourly_cap_limits_entries() {
    let mut config = scripted_config();
    config.risk.max_trades_per_hour = 1;
    let candles: Vec<Candle> = (0..12)
        .map(|i| Candle::new(t0() + Duration::minutes(10 * i), 100.0, 100.5, 99.5, 100.0, 100.0))
        .collect();
    config.exits.max_holding_candles = Some(1);
    let engine = Engine::with_signal_source(config, scripted(|_| true)).unwrap();
    let result = engine.run(&candles).unwrap();

    // Six candles per hour, two hours: one entry per hour.
    assert_eq!(result.diagnostics.entries, 2);
    assert!(result.diagnostics.declines.get("hourly_cap").copied().unwrap_or(0) > 0);
    assert_eq!(result.trades[0].close_reason, CloseReason::MaxHolding);
}

#[test]
fn liquidation_floors_return_at_minus_one() {
    let mut config = scripted_config();
    config.risk.base_leverage = 10.0;
    config.risk.max_leverage = 10.0;
    config.fee_rate = 0.001;
    let mut candles: Vec<Candle> = (0..6)
        .map(|i| Candle::new(t0() + Duration::hours(i), 100.0, 100.5, 99.5, 100.0, 100.0))
        .collect();
    // Gap far below the liquidation price
    candles[3] = Candle::new(t0() + Duration::hours(3), 80.0, 80.5, 79.0, 80.0, 100.0);

    let engine = Engine::with_signal_source(config, scripted(|len| len == 2)).unwrap();
    let result = engine.run(&candles).unwrap();

    let trade = &result.trades[0];
    assert_eq!(trade.close_reason, CloseReason::Liquidation);
    assert_eq!(trade.exit_price, 80.0);
    assert_eq!(trade.return_rate, -1.0);
    assert!((trade.pnl + trade.margin).abs() < 1e-9);
}

#[test]
fn equity_curve_sampling_cadence() {
    let mut config = scripted_config();
    config.equity_sample_every = 5;
    let engine = Engine::with_signal_source(config, scripted(|_| false)).unwrap();
    let result = engine.run(&hourly_decline(30)).unwrap();

    // 0, 5, 10, 15, 20, 25 plus the final candle
    assert_eq!(result.equity_curve.len(), 7);
    assert_eq!(result.equity_curve.last().unwrap().timestamp, t0() + Duration::hours(29));
    assert!(result.equity_curve.iter().all(|p| p.capital == 10_000.0 && p.drawdown == 0.0));
}

#[test]
fn runs_are_deterministic() {
    let candles: Vec<Candle> = (0..600)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + (x * 0.05).sin() * 8.0 + x * 0.01;
            let open = 100.0 + ((x - 1.0) * 0.05).sin() * 8.0 + (x - 1.0) * 0.01;
            Candle::new(
                t0() + Duration::minutes(15 * i),
                open,
                open.max(close) + 0.3,
                open.min(close) - 0.3,
                close,
                1_000.0 + (i % 7) as f64 * 150.0,
            )
        })
        .collect();
    let config = EngineConfig {
        signal: SignalConfig {
            rsi_long_band: (45.0, 100.0),
            rsi_short_band: (0.0, 55.0),
            ..SignalConfig::default()
        },
        risk: RiskConfig {
            min_confidence: 0.4,
            ..RiskConfig::default()
        },
        ..EngineConfig::default()
    };

    let a = Engine::new(config.clone()).unwrap().run(&candles).unwrap();
    let b = Engine::new(config).unwrap().run(&candles).unwrap();

    assert!(!a.trades.is_empty(), "scenario should trade");
    assert_eq!(
        serde_json::to_string(&a.trades).unwrap(),
        serde_json::to_string(&b.trades).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a.metrics).unwrap(),
        serde_json::to_string(&b.metrics).unwrap()
    );
}

// ── Errors ───────────────────────────────────────────────────────────

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = EngineConfig::default();
    config.exits.take_profits = vec![
        TakeProfitLevel {
            offset: 0.01,
            close_fraction: 0.6,
        },
        TakeProfitLevel {
            offset: 0.02,
            close_fraction: 0.6,
        },
    ];
    assert!(matches!(Engine::new(config), Err(ConfigError::LadderOverallocated { .. })));
}

#[test]
fn malformed_candles_are_rejected() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    assert_eq!(engine.run(&[]).unwrap_err(), DataError::Empty);

    let mut candles = hourly_decline(5);
    candles[2].timestamp = candles[1].timestamp;
    assert!(matches!(
        engine.run(&candles),
        Err(DataError::NonIncreasingTimestamp { index: 2, .. })
    ));

    let mut candles = hourly_decline(5);
    candles[3].low = candles[3].close + 1.0;
    assert!(matches!(engine.run(&candles), Err(DataError::OhlcViolation { index: 3, .. })));

    let mut candles = hourly_decline(5);
    candles[1].volume = -1.0;
    assert!(matches!(engine.run(&candles), Err(DataError::InvalidVolume { index: 1, .. })));
}

// ── Signal preparation ───────────────────────────────────────────────

/// Never fires; counts how the engine asks for signals.
#[derive(Default)]
struct Counting {
    history: usize,
    generate_calls: AtomicUsize,
    prepare_calls: AtomicUsize,
}

struct CountingPrepared<'a> {
    strategy: &'a str,
}

impl PreparedSignals for CountingPrepared<'_> {
    fn signal_at(&self, _i: usize) -> Signal {
        Signal::none(self.strategy, IndicatorSnapshot::default())
    }
}

impl SignalSource for Counting {
    fn generate(&self, _window: &[Candle]) -> Signal {
        self.generate_calls.fetch_add(1, Ordering::Relaxed);
        Signal::none("counting", IndicatorSnapshot::default())
    }

    fn name(&self) -> &str {
        "counting"
    }

    fn min_history(&self) -> usize {
        self.history
    }

    fn prepare<'a>(&'a self, _candles: &'a [Candle]) -> Box<dyn PreparedSignals + 'a> {
        self.prepare_calls.fetch_add(1, Ordering::Relaxed);
        Box::new(CountingPrepared { strategy: "counting" })
    }
}

/// Hands the engine a counter it can still be read from after the run.
struct Shared(Arc<Counting>);

impl SignalSource for Shared {
    fn generate(&self, window: &[Candle]) -> Signal {
        self.0.generate(window)
    }

    fn name(&self) -> &str {
        self.0.name()
    }

    fn min_history(&self) -> usize {
        self.0.min_history()
    }

    fn prepare<'a>(&'a self, candles: &'a [Candle]) -> Box<dyn PreparedSignals + 'a> {
        self.0.prepare(candles)
    }
}

#[test]
fn signals_are_prepared_once_per_run() {
    let source = Arc::new(Counting::default());
    let engine = Engine::with_signal_source(scripted_config(), Box::new(Shared(source.clone()))).unwrap();
    let result = engine.run(&linear_uptrend()).unwrap();

    assert_eq!(source.prepare_calls.load(Ordering::Relaxed), 1);
    assert_eq!(source.generate_calls.load(Ordering::Relaxed), 0);
    assert_eq!(result.diagnostics.signals_evaluated, 99);
}

#[test]
fn source_min_history_delays_first_decision() {
    let source = Counting {
        history: 50,
        ..Counting::default()
    };
    let engine = Engine::with_signal_source(scripted_config(), Box::new(source)).unwrap();
    let result = engine.run(&linear_uptrend()).unwrap();
    // Decisions at 50..=98: the final candle never opens a position.
    assert_eq!(result.diagnostics.signals_evaluated, 49);
}

#[test]
fn warmup_candles_and_min_history_take_the_larger() {
    let source = Counting {
        history: 10,
        ..Counting::default()
    };
    let config = EngineConfig {
        warmup_candles: 30,
        ..scripted_config()
    };
    let engine = Engine::with_signal_source(config, Box::new(source)).unwrap();
    let result = engine.run(&linear_uptrend()).unwrap();
    assert_eq!(result.diagnostics.signals_evaluated, 69);
}

/// Hourly candles with a slow wave and volume swings.
fn wavy_hourly(n: usize) -> Vec<Candle> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let open = price;
            let close = open * (1.0 + (i as f64 * 0.05).sin() * 0.004 + (i as f64 * 0.31).cos() * 0.002);
            price = close;
            Candle::new(
                t0() + Duration::hours(i as i64),
                open,
                open.max(close) * 1.001,
                open.min(close) * 0.999,
                close,
                900.0 + (i % 11) as f64 * 40.0,
            )
        })
        .collect()
}

fn fastest_run(engine: &Engine, candles: &[Candle]) -> StdDuration {
    (0..3)
        .map(|_| {
            let start = Instant::now();
            engine.run(candles).unwrap();
            start.elapsed()
        })
        .min()
        .unwrap_or_default()
}

#[test]
fn run_time_grows_linearly_with_candles() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let small = wavy_hourly(2_000);
    let large = wavy_hourly(16_000);

    let t_small = fastest_run(&engine, &small).as_secs_f64().max(1e-4);
    let t_large = fastest_run(&engine, &large).as_secs_f64();
    // 8x the candles: linear cost is ~8x, quadratic would be ~64x.
    assert!(
        t_large / t_small < 24.0,
        "2k candles took {t_small:.4}s, 16k took {t_large:.4}s"
    );
}
