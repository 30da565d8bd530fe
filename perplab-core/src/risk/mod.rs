//! Risk & sizing: signal + account + market context → execution plan.
//!
//! The manager is account-aware but never looks at candles: everything it
//! knows about the market arrives through the signal's indicator snapshot
//! and the `MarketContext` the engine builds at the entry candle's open.

pub mod plan;

pub use plan::{DeclineReason, ExecutionPlan, MarketContext, SizingOutcome};

use crate::config::{ExitConfig, ReduceRisk, RiskConfig, StopLossRule};
use crate::domain::{AccountState, Direction, Side, Signal, TakeProfitTarget};

#[derive(Debug, Clone)]
pub struct RiskManager {
    risk: RiskConfig,
    exits: ExitConfig,
}

impl RiskManager {
    pub fn new(risk: RiskConfig, exits: ExitConfig) -> Self {
        Self { risk, exits }
    }

    pub fn size(&self, signal: &Signal, account: &AccountState, market: &MarketContext) -> SizingOutcome {
        match self.plan(signal, account, market) {
            Ok(plan) => SizingOutcome::Trade(plan),
            Err(reason) => SizingOutcome::Declined(reason),
        }
    }

    fn plan(
        &self,
        signal: &Signal,
        account: &AccountState,
        market: &MarketContext,
    ) -> Result<ExecutionPlan, DeclineReason> {
        let risk = &self.risk;
        let side = match signal.direction {
            Direction::Long => Side::Long,
            Direction::Short => Side::Short,
            Direction::None => return Err(DeclineReason::NoDirection),
        };
        if signal.confidence < risk.min_confidence {
            return Err(DeclineReason::LowConfidence {
                confidence: signal.confidence,
                min: risk.min_confidence,
            });
        }
        if account.trades_today >= risk.max_trades_per_day {
            return Err(DeclineReason::DailyCap {
                trades: account.trades_today,
            });
        }
        if account.trades_this_hour >= risk.max_trades_per_hour {
            return Err(DeclineReason::HourlyCap {
                trades: account.trades_this_hour,
            });
        }
        if account.capital <= 0.0 {
            return Err(DeclineReason::NoCapital);
        }

        let drawdown = account.drawdown();
        let shrink = if drawdown > risk.reduce_risk_drawdown {
            match risk.reduce_risk {
                ReduceRisk::Decline => return Err(DeclineReason::Drawdown { drawdown }),
                ReduceRisk::Shrink {
                    size_factor,
                    leverage_factor,
                } => Some((size_factor, leverage_factor)),
            }
        } else {
            None
        };

        let stop_distance = self.stop_distance(market);
        if !(stop_distance > 0.0) {
            return Err(DeclineReason::NoStopDistance);
        }

        let leverage = self.leverage(signal.confidence, market.volatility, shrink.map(|s| s.1));
        let size_fraction = self.size_fraction(signal.confidence, account, shrink.map(|s| s.0));
        let margin = account.capital * size_fraction;
        let entry = market.entry_price;

        Ok(ExecutionPlan {
            side,
            entry_index: market.entry_index,
            entry_time: market.entry_time,
            entry_price: entry,
            leverage,
            size_fraction,
            margin,
            notional: margin * leverage,
            stop_loss: entry * (1.0 - side.sign() * stop_distance),
            take_profits: self
                .exits
                .take_profits
                .iter()
                .map(|level| TakeProfitTarget {
                    price: entry * (1.0 + side.sign() * level.offset),
                    close_fraction: level.close_fraction,
                })
                .collect(),
            trailing: self.exits.trailing,
            max_holding_candles: self.exits.max_holding_candles,
            breakeven_after_first_tp: self.exits.breakeven_after_first_tp,
            confidence: signal.confidence,
            strategy_id: signal.strategy_id.clone(),
            reduced_risk: shrink.is_some(),
        })
    }

    /// Base leverage, one tier up on high confidence, one down on high
    /// volatility, optionally shrunk, clamped to the configured range.
    pub fn leverage(&self, confidence: f64, volatility: f64, shrink: Option<f64>) -> f64 {
        let risk = &self.risk;
        let mut leverage = risk.base_leverage;
        if confidence > risk.high_confidence {
            leverage += risk.leverage_step;
        }
        if volatility > risk.high_volatility {
            leverage -= risk.leverage_step;
        }
        if let Some(factor) = shrink {
            leverage *= factor;
        }
        leverage.clamp(risk.min_leverage, risk.max_leverage)
    }

    /// Base × confidence × streak adjustment, optionally shrunk, clamped.
    pub fn size_fraction(&self, confidence: f64, account: &AccountState, shrink: Option<f64>) -> f64 {
        let risk = &self.risk;
        let streak = if account.consecutive_wins >= risk.win_streak && account.consecutive_wins > 0 {
            1.0 + risk.win_boost
        } else if account.consecutive_losses > 0 {
            1.0 - risk.loss_cut
        } else {
            1.0
        };
        let mut size = risk.base_size * confidence * streak;
        if let Some(factor) = shrink {
            size *= factor;
        }
        size.clamp(risk.min_size, risk.max_size)
    }

    /// Stop distance as a fraction of entry price, capped at `max_stop_distance`.
    pub fn stop_distance(&self, market: &MarketContext) -> f64 {
        let raw = match self.exits.stop_loss {
            StopLossRule::Fixed { fraction } => fraction,
            StopLossRule::Atr { multiplier } => {
                if market.entry_price > 0.0 {
                    market.atr / market.entry_price * multiplier
                } else {
                    0.0
                }
            }
        };
        raw.min(self.exits.max_stop_distance)
    }
}
