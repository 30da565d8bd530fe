//! The engine: one immutable configuration, one synchronous pass per run.

use super::circuit_breaker::CircuitBreakers;
use super::state::{RunDiagnostics, RunResult};
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{validate_series, AccountState, Candle, DataError, EquityPoint};
use crate::lifecycle::{ExitRules, PositionLifecycle};
use crate::metrics::PerformanceMetrics;
use crate::risk::{MarketContext, RiskManager, SizingOutcome};
use crate::signals::{PreparedSignals, SignalGenerator, SignalSource};
use tracing::{debug, trace};

/// Backtest engine.
///
/// Holds no per-run state: `run` can be called repeatedly (and concurrently
/// from several threads) with identical results for identical input.
pub struct Engine {
    config: EngineConfig,
    signals: Box<dyn SignalSource>,
    risk: RiskManager,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("signals", &self.signals.name())
            .finish()
    }
}

impl Engine {
    /// Validate the configuration and build the configured signal generator.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let generator = SignalGenerator::new(config.signal.clone());
        Self::with_signal_source(config, Box::new(generator))
    }

    /// Same as `new`, with a caller-supplied signal source.
    pub fn with_signal_source(config: EngineConfig, signals: Box<dyn SignalSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let risk = RiskManager::new(config.risk.clone(), config.exits.clone());
        Ok(Self { config, signals, risk })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one backtest over a validated candle series.
    pub fn run(&self, candles: &[Candle]) -> Result<RunResult, DataError> {
        validate_series(candles)?;

        let cfg = &self.config;
        let n = candles.len();
        let mut account = AccountState::new(cfg.initial_capital);
        let mut lifecycle = PositionLifecycle::new(ExitRules {
            fee_rate: cfg.fee_rate,
            maintenance_margin: cfg.exits.maintenance_margin,
            emergency_drawdown: cfg.breakers.emergency_drawdown,
        });
        let mut breakers = CircuitBreakers::new(cfg.breakers.clone());
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(n / cfg.equity_sample_every + 1);
        let mut curve_peak = f64::MIN;
        let mut diag = RunDiagnostics {
            candles: n,
            ..RunDiagnostics::default()
        };
        let signals = self.signals.prepare(candles);
        let warmup = cfg.warmup_candles.max(self.signals.min_history());

        for (i, candle) in candles.iter().enumerate() {
            let is_last = i + 1 == n;
            trace!(index = i, close = candle.close, flat = lifecycle.is_flat(), "candle");

            // 0. Calendar
            if account.roll_clock(candle.timestamp) {
                breakers.on_new_day();
            }

            // 1. Exits
            if let Some(trade) = lifecycle.on_candle(i, candle, is_last, &account) {
                debug!(
                    index = i,
                    reason = %trade.close_reason.label(),
                    price = trade.exit_price,
                    fraction = trade.close_fraction,
                    pnl = trade.pnl,
                    "position closed"
                );
                account.apply_trade(&trade);
                trades.push(trade);

                // 2. Breakers
                for trip in breakers.check(i, candle.timestamp, &account) {
                    debug!(index = i, kind = ?trip.kind, value = trip.value, "circuit breaker tripped");
                }
            }

            // 3. Entry
            if lifecycle.is_flat() && i >= warmup && !is_last {
                if breakers.is_allowed() {
                    self.try_enter(i, candles, signals.as_ref(), &mut account, &mut lifecycle, &mut diag);
                } else {
                    diag.blocked_by_breakers += 1;
                }
            }

            // 4. Equity sampling
            if i % cfg.equity_sample_every == 0 || is_last {
                curve_peak = curve_peak.max(account.capital);
                let drawdown = if curve_peak > 0.0 {
                    ((curve_peak - account.capital) / curve_peak).max(0.0)
                } else {
                    0.0
                };
                equity_curve.push(EquityPoint {
                    timestamp: candle.timestamp,
                    capital: account.capital,
                    drawdown,
                });
            }
        }

        assert!(lifecycle.is_flat(), "position still open after the final candle");

        let elapsed = candles[n - 1].timestamp - candles[0].timestamp;
        let metrics = PerformanceMetrics::compute(
            &trades,
            &equity_curve,
            cfg.initial_capital,
            elapsed,
            cfg.risk_free_rate,
        );
        debug!(
            trades = metrics.total_trades,
            total_return = metrics.total_return,
            max_drawdown = metrics.max_drawdown,
            "run complete"
        );

        Ok(RunResult {
            trades,
            equity_curve,
            metrics,
            final_account: account,
            diagnostics: diag,
            breaker_trips: breakers.into_trips(),
        })
    }

    /// Signal over the closed candles before `i`, then sizing; opens at `candles[i].open`.
    fn try_enter(
        &self,
        i: usize,
        candles: &[Candle],
        signals: &dyn PreparedSignals,
        account: &mut AccountState,
        lifecycle: &mut PositionLifecycle,
        diag: &mut RunDiagnostics,
    ) {
        let signal = signals.signal_at(i);
        diag.signals_evaluated += 1;
        if !signal.is_actionable() {
            return;
        }
        diag.actionable_signals += 1;

        let candle = &candles[i];
        let market = MarketContext {
            entry_index: i,
            entry_time: candle.timestamp,
            entry_price: candle.open,
            atr: signal.indicators.atr,
            volatility: signal.indicators.volatility,
        };

        match self.risk.size(&signal, account, &market) {
            SizingOutcome::Trade(plan) => {
                debug!(
                    index = i,
                    side = ?plan.side,
                    price = plan.entry_price,
                    leverage = plan.leverage,
                    size = plan.size_fraction,
                    confidence = plan.confidence,
                    "position opened"
                );
                lifecycle.open(plan);
                account.record_entry();
                diag.entries += 1;
            }
            SizingOutcome::Declined(reason) => {
                debug!(index = i, reason = reason.label(), "entry declined");
                *diag.declines.entry(reason.label().to_string()).or_insert(0) += 1;
            }
        }
    }
}
