//! Account state: capital, high-water mark, drawdown, trade counters and streaks.

use super::trade::Trade;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Simulation account. Mutated only by the backtest driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub capital: f64,
    /// High-water mark; never decreases.
    pub peak_capital: f64,
    /// Positions opened on the current UTC day.
    pub trades_today: u32,
    /// Positions opened in the current UTC hour.
    pub trades_this_hour: u32,
    pub day_start_capital: f64,
    pub day_realized_pnl: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    current_day: Option<NaiveDate>,
    current_hour: Option<(NaiveDate, u32)>,
}

impl AccountState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            peak_capital: initial_capital,
            trades_today: 0,
            trades_this_hour: 0,
            day_start_capital: initial_capital,
            day_realized_pnl: 0.0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            current_day: None,
            current_hour: None,
        }
    }

    /// Realized drawdown from the high-water mark, in [0, 1].
    pub fn drawdown(&self) -> f64 {
        if self.peak_capital <= 0.0 {
            return 0.0;
        }
        ((self.peak_capital - self.capital) / self.peak_capital).max(0.0)
    }

    /// Realized day pnl as a fraction of the capital the day started with.
    pub fn day_return(&self) -> f64 {
        if self.day_start_capital <= 0.0 {
            return 0.0;
        }
        self.day_realized_pnl / self.day_start_capital
    }

    /// Advance the calendar clock. Returns true when a new UTC day began.
    pub fn roll_clock(&mut self, now: DateTime<Utc>) -> bool {
        let day = now.date_naive();
        let hour = (day, now.hour());

        if self.current_hour != Some(hour) {
            self.current_hour = Some(hour);
            self.trades_this_hour = 0;
        }

        if self.current_day == Some(day) {
            return false;
        }
        let is_rollover = self.current_day.is_some();
        self.current_day = Some(day);
        self.trades_today = 0;
        self.day_start_capital = self.capital;
        self.day_realized_pnl = 0.0;
        is_rollover
    }

    /// Count a newly opened position against the frequency caps.
    pub fn record_entry(&mut self) {
        self.trades_today += 1;
        self.trades_this_hour += 1;
    }

    /// Book a realized trade: compound capital, move the high-water mark, update streaks.
    pub fn apply_trade(&mut self, trade: &Trade) {
        self.capital += trade.pnl;
        self.day_realized_pnl += trade.pnl;
        if self.capital > self.peak_capital {
            self.peak_capital = self.capital;
        }

        if trade.is_winner() {
            self.consecutive_wins += 1;
            self.consecutive_losses = 0;
        } else if trade.is_loser() {
            self.consecutive_losses += 1;
            self.consecutive_wins = 0;
        }
    }
}

/// One sample of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub capital: f64,
    pub drawdown: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CloseReason, Side};
    use chrono::TimeZone;

    fn trade_with_pnl(pnl: f64) -> Trade {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            side: Side::Long,
            entry_index: 0,
            entry_time: t,
            entry_price: 100.0,
            exit_index: 1,
            exit_time: t,
            exit_price: 100.0,
            close_fraction: 1.0,
            notional: 1_000.0,
            margin: 1_000.0,
            leverage: 1.0,
            return_rate: pnl / 1_000.0,
            fees: 0.0,
            pnl,
            close_reason: CloseReason::StopLoss,
            holding_secs: 0,
            candles_held: 1,
            strategy_id: "t".into(),
        }
    }

    #[test]
    fn new_account_has_no_drawdown() {
        let acct = AccountState::new(10_000.0);
        assert_eq!(acct.drawdown(), 0.0);
        assert_eq!(acct.peak_capital, 10_000.0);
    }

    #[test]
    fn loss_creates_drawdown_and_peak_holds() {
        let mut acct = AccountState::new(10_000.0);
        acct.apply_trade(&trade_with_pnl(500.0));
        acct.apply_trade(&trade_with_pnl(-1_050.0));
        assert_eq!(acct.peak_capital, 10_500.0);
        assert!((acct.drawdown() - 0.1).abs() < 1e-12);
        assert_eq!(acct.consecutive_losses, 1);
        assert_eq!(acct.consecutive_wins, 0);
    }

    #[test]
    fn streaks_reset_on_opposite_result() {
        let mut acct = AccountState::new(10_000.0);
        acct.apply_trade(&trade_with_pnl(10.0));
        acct.apply_trade(&trade_with_pnl(10.0));
        assert_eq!(acct.consecutive_wins, 2);
        acct.apply_trade(&trade_with_pnl(-5.0));
        assert_eq!(acct.consecutive_wins, 0);
        assert_eq!(acct.consecutive_losses, 1);
    }

    #[test]
    fn roll_clock_resets_daily_counters() {
        let mut acct = AccountState::new(10_000.0);
        let day1 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(!acct.roll_clock(day1));
        acct.record_entry();
        acct.apply_trade(&trade_with_pnl(-100.0));
        assert_eq!(acct.trades_today, 1);
        assert!((acct.day_return() + 0.01).abs() < 1e-12);

        assert!(!acct.roll_clock(day1 + chrono::Duration::minutes(30)));
        assert_eq!(acct.trades_today, 1);

        assert!(acct.roll_clock(day1 + chrono::Duration::days(1)));
        assert_eq!(acct.trades_today, 0);
        assert_eq!(acct.day_realized_pnl, 0.0);
        assert_eq!(acct.day_start_capital, 9_900.0);
    }

    #[test]
    fn roll_clock_resets_hourly_counter() {
        let mut acct = AccountState::new(10_000.0);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap();
        acct.roll_clock(t);
        acct.record_entry();
        acct.roll_clock(t + chrono::Duration::minutes(10));
        assert_eq!(acct.trades_this_hour, 1);
        acct.roll_clock(t + chrono::Duration::minutes(50));
        assert_eq!(acct.trades_this_hour, 0);
        assert_eq!(acct.trades_today, 1);
    }
}
