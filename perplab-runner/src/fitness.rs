//! Fitness functions: metric selector and composite scores for ranking runs.
//!
//! Every score is oriented so that higher is better.

use perplab_core::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    AnnualizedReturn,
    TotalReturn,
    WinRate,
    ProfitFactor,
    Calmar,
    /// Ranked by smallest drawdown.
    MaxDrawdown,
    /// Multi-objective balance of win rate, reward/risk, profit factor,
    /// return, drawdown and trade frequency.
    Balanced,
    /// Drawdown-first score.
    Conservative,
    /// Distance from fixed targets; any metric far off target costs.
    BalancedStrict,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 10] = [
        Self::Sharpe,
        Self::AnnualizedReturn,
        Self::TotalReturn,
        Self::WinRate,
        Self::ProfitFactor,
        Self::Calmar,
        Self::MaxDrawdown,
        Self::Balanced,
        Self::Conservative,
        Self::BalancedStrict,
    ];

    /// Score of a run under this metric.
    pub fn score(&self, m: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => m.sharpe,
            Self::AnnualizedReturn => m.annualized_return,
            Self::TotalReturn => m.total_return,
            Self::WinRate => m.win_rate,
            Self::ProfitFactor => m.profit_factor,
            Self::Calmar => m.calmar,
            Self::MaxDrawdown => -m.max_drawdown,
            Self::Balanced => balanced_score(m),
            Self::Conservative => conservative_score(m),
            Self::BalancedStrict => strict_balanced_score(m),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::AnnualizedReturn => "annualized_return",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::Calmar => "calmar",
            Self::MaxDrawdown => "max_drawdown",
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
            Self::BalancedStrict => "balanced_strict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Profit factor with the no-loser case treated as unbounded.
fn effective_profit_factor(m: &PerformanceMetrics) -> f64 {
    if m.losing_trades == 0 && m.winning_trades > 0 {
        f64::INFINITY
    } else {
        m.profit_factor
    }
}

/// Mean win over mean loss; 10 when there are winners but no losers.
fn reward_risk(m: &PerformanceMetrics) -> f64 {
    if m.avg_loss != 0.0 {
        (m.avg_win / m.avg_loss).abs()
    } else if m.avg_win > 0.0 {
        10.0
    } else {
        0.0
    }
}

/// Bell-shaped frequency score: 1 between 5 and 15 trades per week.
fn frequency_score(trades_per_week: f64) -> f64 {
    if trades_per_week < 1.0 {
        trades_per_week
    } else if trades_per_week > 20.0 {
        (1.0 - (trades_per_week - 20.0) / 30.0).max(0.3)
    } else if (5.0..=15.0).contains(&trades_per_week) {
        1.0
    } else if trades_per_week < 5.0 {
        0.8 + (trades_per_week - 1.0) * 0.05
    } else {
        1.0 - (trades_per_week - 15.0) * 0.04
    }
}

fn sample_penalty(trades: usize) -> f64 {
    match trades {
        0..=9 => 0.5,
        10..=29 => 0.7 + (trades - 10) as f64 * 0.015,
        _ => 1.0,
    }
}

/// Balanced multi-objective score. 0 for runs without trades.
///
/// Targets: 55% win rate, 1.2 reward/risk, 1.3 profit factor, 10% return,
/// drawdown under 20%. Losing or erratic runs are floored at 0.1 / 0.2.
pub fn balanced_score(m: &PerformanceMetrics) -> f64 {
    if m.total_trades == 0 {
        return 0.0;
    }
    let win_pct = m.win_rate * 100.0;
    let pf = effective_profit_factor(m);
    let dd_pct = m.max_drawdown * 100.0;
    let return_pct = m.total_return * 100.0;
    let trades_per_week = m.total_trades as f64 / m.elapsed_days.max(1.0) * 7.0;

    let win_score = (win_pct / 55.0).min(1.5);
    let rr_score = (reward_risk(m) / 1.2).min(2.0);
    let pf_score = (pf / 1.3).min(2.0);
    let return_score = (return_pct / 10.0).clamp(0.0, 1.5);
    let dd_score = (1.0 - dd_pct / 20.0).max(0.0);
    let freq_score = frequency_score(trades_per_week);

    let parts = [win_score, rr_score, pf_score, dd_score, freq_score];
    let mean = parts.iter().sum::<f64>() / parts.len() as f64;
    let std = (parts.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / parts.len() as f64).sqrt();
    let stability_bonus = (1.0 - std).max(0.0) * 0.1;

    let weighted = win_score * 0.20 + rr_score * 0.25 + pf_score * 0.25 + return_score * 0.15 + dd_score * 0.15;

    if pf <= 0.0 || return_pct <= -10.0 {
        0.1
    } else if win_pct < 20.0 || dd_pct > 50.0 {
        0.2
    } else {
        (weighted + stability_bonus) * freq_score * sample_penalty(m.total_trades)
    }
}

/// Drawdown-first score. 0 for runs without trades.
///
/// Weights: drawdown 40% (target ≤ 10%), win rate 30% (target 60%), profit
/// factor 20% (target 1.2), return 10% (target 8%). Scaled by 0.3 when
/// drawdown exceeds 20%, win rate is under 40% or profit factor under 1.
pub fn conservative_score(m: &PerformanceMetrics) -> f64 {
    if m.total_trades == 0 {
        return 0.0;
    }
    let win_pct = m.win_rate * 100.0;
    let pf = effective_profit_factor(m);
    let dd_pct = m.max_drawdown * 100.0;
    let return_pct = m.total_return * 100.0;

    let risk = (1.0 - dd_pct / 10.0).max(0.0);
    let stability = (win_pct / 60.0).min(1.0);
    let profit = (pf / 1.2).min(1.5);
    let ret = (return_pct / 8.0).clamp(0.0, 1.0);

    let score = risk * 0.40 + stability * 0.30 + profit * 0.20 + ret * 0.10;
    if dd_pct > 20.0 || win_pct < 40.0 || pf < 1.0 {
        score * 0.3
    } else {
        score
    }
}

/// Cap for ratios that are unbounded when there are no losing trades.
const RATIO_CAP: f64 = 10.0;

/// Target-deviation score. 0 for runs without trades.
///
/// Targets: 50% win rate, 1.5 reward/risk, 1.3 profit factor, 15% return,
/// drawdown at most 15%. Balance is `1 / (1 + sum of relative deviations)`;
/// runs under 20 trades are halved.
pub fn strict_balanced_score(m: &PerformanceMetrics) -> f64 {
    if m.total_trades == 0 {
        return 0.0;
    }
    let win_pct = m.win_rate * 100.0;
    let pf = effective_profit_factor(m).min(RATIO_CAP);
    let dd_pct = m.max_drawdown * 100.0;
    let return_pct = m.total_return * 100.0;
    let trades_per_week = m.total_trades as f64 / m.elapsed_days.max(1.0) * 7.0;

    let win_dev = (win_pct - 50.0).abs() / 50.0;
    let rr_dev = (reward_risk(m) - 1.5).abs() / 1.5;
    let pf_dev = (pf - 1.3).abs() / 1.3;
    let dd_penalty = ((dd_pct - 15.0) / 15.0).max(0.0);
    let balance = 1.0 / (1.0 + win_dev + rr_dev + pf_dev + dd_penalty);

    let performance = (return_pct / 15.0).clamp(0.0, 1.0);
    let frequency = if (3.0..=12.0).contains(&trades_per_week) {
        1.0
    } else {
        (1.0 - (trades_per_week - 7.5).abs() / 15.0).max(0.3)
    };

    let score = balance * 0.6 + performance * 0.3 + frequency * 0.1;
    if m.total_trades < 20 {
        score * 0.5
    } else {
        score
    }
}
