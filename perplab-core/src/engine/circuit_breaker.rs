//! Circuit breakers that suspend new entries.
//!
//! Two breakers, both re-evaluated only when a trade is realized (the only
//! time realized drawdown or day pnl can change):
//! - max drawdown: trips when realized drawdown exceeds the limit; stays open
//!   for the rest of the run or until the next UTC day, per configuration;
//! - daily loss: trips when the day's realized loss reaches the limit; closes
//!   at the next UTC day.

use crate::config::{BreakerConfig, BreakerReset};
use crate::domain::AccountState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerKind {
    MaxDrawdown,
    DailyLoss,
}

/// State of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Entries allowed.
    Closed,
    /// Tripped; entries refused until reset.
    Open {
        tripped_at: DateTime<Utc>,
        reset: BreakerReset,
    },
}

impl BreakerState {
    fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open { .. })
    }
}

/// A recorded trip, kept in the run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerTrip {
    pub kind: BreakerKind,
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    /// Drawdown or day loss (positive fraction) that tripped it.
    pub value: f64,
    pub reset: BreakerReset,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakers {
    config: BreakerConfig,
    drawdown: BreakerState,
    daily: BreakerState,
    trips: Vec<BreakerTrip>,
}

impl CircuitBreakers {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            drawdown: BreakerState::Closed,
            daily: BreakerState::Closed,
            trips: Vec::new(),
        }
    }

    /// True if no breaker is open.
    pub fn is_allowed(&self) -> bool {
        !self.drawdown.is_open() && !self.daily.is_open()
    }

    pub fn state(&self, kind: BreakerKind) -> BreakerState {
        match kind {
            BreakerKind::MaxDrawdown => self.drawdown,
            BreakerKind::DailyLoss => self.daily,
        }
    }

    /// Close every breaker whose reset is the next UTC day.
    pub fn on_new_day(&mut self) {
        for state in [&mut self.drawdown, &mut self.daily] {
            if let BreakerState::Open {
                reset: BreakerReset::NextDay,
                ..
            } = state
            {
                *state = BreakerState::Closed;
            }
        }
    }

    /// Re-evaluate after a realized trade. Returns the trips recorded now.
    pub fn check(&mut self, index: usize, now: DateTime<Utc>, account: &AccountState) -> Vec<BreakerTrip> {
        let mut tripped = Vec::new();

        let drawdown = account.drawdown();
        if !self.drawdown.is_open() && drawdown > self.config.max_drawdown {
            let reset = self.config.max_drawdown_reset;
            self.drawdown = BreakerState::Open { tripped_at: now, reset };
            tripped.push(BreakerTrip {
                kind: BreakerKind::MaxDrawdown,
                index,
                timestamp: now,
                value: drawdown,
                reset,
            });
        }

        let day_loss = -account.day_return();
        if !self.daily.is_open() && day_loss >= self.config.daily_loss_limit && day_loss > 0.0 {
            let reset = BreakerReset::NextDay;
            self.daily = BreakerState::Open { tripped_at: now, reset };
            tripped.push(BreakerTrip {
                kind: BreakerKind::DailyLoss,
                index,
                timestamp: now,
                value: day_loss,
                reset,
            });
        }

        self.trips.extend(tripped.iter().cloned());
        tripped
    }

    pub fn trips(&self) -> &[BreakerTrip] {
        &self.trips
    }

    pub fn into_trips(self) -> Vec<BreakerTrip> {
        self.trips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn account(capital: f64, peak: f64, day_pnl: f64) -> AccountState {
        let mut a = AccountState::new(peak);
        a.capital = capital;
        a.day_realized_pnl = day_pnl;
        a
    }

    #[test]
    fn starts_closed() {
        let cb = CircuitBreakers::new(BreakerConfig::default());
        assert!(cb.is_allowed());
        assert_eq!(cb.state(BreakerKind::MaxDrawdown), BreakerState::Closed);
    }

    #[test]
    fn max_drawdown_permanent() {
        let mut cb = CircuitBreakers::new(BreakerConfig {
            max_drawdown: 0.2,
            daily_loss_limit: 1.0,
            ..BreakerConfig::default()
        });
        assert!(cb.check(3, now(), &account(8_500.0, 10_000.0, 0.0)).is_empty());
        let trips = cb.check(4, now(), &account(7_900.0, 10_000.0, 0.0));
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].kind, BreakerKind::MaxDrawdown);
        assert!(!cb.is_allowed());

        cb.on_new_day();
        assert!(!cb.is_allowed(), "permanent breaker must survive day rollover");
    }

    #[test]
    fn max_drawdown_next_day() {
        let mut cb = CircuitBreakers::new(BreakerConfig {
            max_drawdown: 0.2,
            max_drawdown_reset: BreakerReset::NextDay,
            daily_loss_limit: 1.0,
            ..BreakerConfig::default()
        });
        cb.check(4, now(), &account(7_900.0, 10_000.0, 0.0));
        assert!(!cb.is_allowed());
        cb.on_new_day();
        assert!(cb.is_allowed());
    }

    #[test]
    fn daily_loss_resets_next_day() {
        let mut cb = CircuitBreakers::new(BreakerConfig {
            daily_loss_limit: 0.03,
            ..BreakerConfig::default()
        });
        assert!(cb.check(1, now(), &account(9_800.0, 10_000.0, -200.0)).is_empty());
        let trips = cb.check(2, now(), &account(9_700.0, 10_000.0, -300.0));
        assert_eq!(trips[0].kind, BreakerKind::DailyLoss);
        assert!((trips[0].value - 0.03).abs() < 1e-12);
        assert!(!cb.is_allowed());

        // Already open: no duplicate trip
        assert!(cb.check(3, now(), &account(9_600.0, 10_000.0, -400.0)).is_empty());

        cb.on_new_day();
        assert!(cb.is_allowed());
        assert_eq!(cb.trips().len(), 1);
    }
}
