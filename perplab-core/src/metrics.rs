//! Performance metrics as pure functions over the trade list and equity curve.
//!
//! Every degenerate case (no trades, no losers, zero variance, zero elapsed
//! time) is defined as 0 rather than NaN.

use crate::domain::{EquityPoint, Trade};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DAYS_PER_YEAR: f64 = 365.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    /// Mean return on margin of winning trades.
    pub avg_win: f64,
    /// Mean return on margin of losing trades (negative).
    pub avg_loss: f64,
    pub avg_holding_hours: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub elapsed_days: f64,
    pub final_capital: f64,
    /// Trade count per close-reason label.
    pub exits_by_reason: BTreeMap<String, usize>,
}

impl PerformanceMetrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        elapsed: Duration,
        risk_free_rate: f64,
    ) -> Self {
        let elapsed_days = elapsed.num_seconds() as f64 / 86_400.0;
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let total_return = total_return(initial_capital, total_pnl);
        let annualized = annualized_return(total_return, elapsed_days);
        let max_dd = max_drawdown(equity_curve);

        let mut exits_by_reason = BTreeMap::new();
        for trade in trades {
            *exits_by_reason.entry(trade.close_reason.label()).or_insert(0) += 1;
        }

        Self {
            total_trades: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            total_pnl,
            total_return,
            annualized_return: annualized,
            sharpe: sharpe_ratio(equity_curve, elapsed_days, risk_free_rate),
            max_drawdown: max_dd,
            calmar: calmar_ratio(annualized, max_dd),
            avg_win: mean(&returns_where(trades, |t| t.is_winner())),
            avg_loss: mean(&returns_where(trades, |t| t.is_loser())),
            avg_holding_hours: mean(&trades.iter().map(|t| t.holding_hours()).collect::<Vec<_>>()),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            elapsed_days,
            final_capital: initial_capital + total_pnl,
            exits_by_reason,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Realized return on initial capital, floored at −1.
pub fn total_return(initial_capital: f64, total_pnl: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (total_pnl / initial_capital).max(-1.0)
}

/// `(1 + total)^(365 / elapsed_days) − 1`.
///
/// 0 when no time elapsed, −1 when wiped out. Compounding a short window to a
/// year can overflow; that saturates at `f64::MAX`.
pub fn annualized_return(total_return: f64, elapsed_days: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 0.0;
    }
    if total_return <= -1.0 {
        return -1.0;
    }
    let value = (1.0 + total_return).powf(DAYS_PER_YEAR / elapsed_days) - 1.0;
    if value.is_finite() {
        value
    } else {
        f64::MAX
    }
}

/// Annualized return over max drawdown; 0 without a drawdown.
///
/// A saturated annualized return over a small drawdown overflows; that
/// saturates at `f64::MAX` too, so reports stay serializable.
pub fn calmar_ratio(annualized: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return 0.0;
    }
    let value = annualized / max_drawdown;
    if value.is_finite() {
        value
    } else {
        f64::MAX
    }
}

/// Winning trades / total trades.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Mean winning return / |mean losing return|. 0 without losing trades.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let wins = returns_where(trades, |t| t.is_winner());
    let losses = returns_where(trades, |t| t.is_loser());
    if losses.is_empty() {
        return 0.0;
    }
    let avg_loss = mean(&losses).abs();
    if avg_loss < 1e-15 {
        return 0.0;
    }
    mean(&wins) / avg_loss
}

/// Annualized Sharpe ratio of the equity-curve sample returns.
///
/// Periods per year are inferred from the sample count and elapsed time.
/// 0 with fewer than two returns, no elapsed time, or zero deviation.
pub fn sharpe_ratio(equity_curve: &[EquityPoint], elapsed_days: f64, risk_free_rate: f64) -> f64 {
    let returns = periodic_returns(equity_curve);
    if returns.len() < 2 || elapsed_days <= 0.0 {
        return 0.0;
    }
    let periods_per_year = returns.len() as f64 / (elapsed_days / DAYS_PER_YEAR);
    let periodic_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - periodic_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / std * periods_per_year.sqrt()
}

/// Largest peak-to-trough decline as a non-negative fraction.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let capitals: Vec<f64> = equity_curve.iter().map(|p| p.capital).collect();
    drawdown_series(&capitals).into_iter().fold(0.0, f64::max)
}

/// Drawdown series: `(max(equity[..=t]) − equity[t]) / max(equity[..=t])`.
pub fn drawdown_series(capitals: &[f64]) -> Vec<f64> {
    let mut peak = f64::MIN;
    capitals
        .iter()
        .map(|&c| {
            peak = peak.max(c);
            if peak > 0.0 {
                ((peak - c) / peak).max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity samples.
pub fn periodic_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].capital > 0.0 {
                (w[1].capital - w[0].capital) / w[0].capital
            } else {
                0.0
            }
        })
        .collect()
}

fn returns_where(trades: &[Trade], pred: impl Fn(&Trade) -> bool) -> Vec<f64> {
    trades.iter().filter(|t| pred(t)).map(|t| t.return_rate).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        let hit = if winners { trade.is_winner() } else { trade.is_loser() };
        if hit {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
