//! Run result and per-run diagnostics.

use super::circuit_breaker::BreakerTrip;
use crate::domain::{AccountState, EquityPoint, Trade};
use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters describing how entry decisions went.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub candles: usize,
    /// Signal generator calls (flat, past warm-up, breakers closed).
    pub signals_evaluated: usize,
    /// Signals with a direction.
    pub actionable_signals: usize,
    pub entries: usize,
    /// Decline count per reason label.
    pub declines: BTreeMap<String, usize>,
    /// Candles on which a breaker blocked the entry check.
    pub blocked_by_breakers: usize,
}

/// Everything a single engine run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Ordered by close time.
    pub trades: Vec<Trade>,
    /// Ordered by timestamp.
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    pub final_account: AccountState,
    pub diagnostics: RunDiagnostics,
    pub breaker_trips: Vec<BreakerTrip>,
}
