//! Exit evaluation for one candle, in fixed precedence order.
//!
//! 1. liquidation, emergency drawdown, end of data
//! 2. stop-loss
//! 3. trailing stop (if armed)
//! 4. first unconsumed take-profit level
//! 5. max holding duration
//!
//! First match wins; at most one exit fires per candle.

use crate::domain::{Candle, CloseReason, Position, Side};

/// Account-level inputs to the forced exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub fee_rate: f64,
    pub maintenance_margin: f64,
    pub emergency_drawdown: f64,
}

/// What the current candle did to the open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub reason: CloseReason,
    pub price: f64,
    /// Share of the original size to close; `None` closes everything left.
    pub fraction: Option<f64>,
}

impl ExitDecision {
    fn full(reason: CloseReason, price: f64) -> Self {
        Self {
            reason,
            price,
            fraction: None,
        }
    }
}

/// Candle being evaluated and the account it marks against.
#[derive(Debug, Clone, Copy)]
pub struct ExitInputs<'a> {
    pub index: usize,
    pub candle: &'a Candle,
    pub is_last: bool,
    pub capital: f64,
    pub peak_capital: f64,
}

/// Return on margin for closing at `exit_price`: leveraged price move minus
/// round-trip fees, floored at −1.
pub fn return_rate(position: &Position, exit_price: f64, fee_rate: f64) -> f64 {
    let gross = position.price_return(exit_price) * position.leverage;
    let fees = 2.0 * fee_rate * position.leverage;
    (gross - fees).max(-1.0)
}

/// Adverse price move (fraction of entry) that wipes the margin down to maintenance.
pub fn liquidation_distance(position: &Position, maintenance_margin: f64) -> f64 {
    (1.0 - maintenance_margin) / position.leverage
}

pub fn liquidation_price(position: &Position, maintenance_margin: f64) -> f64 {
    position.entry_price * (1.0 - position.side.sign() * liquidation_distance(position, maintenance_margin))
}

/// Fill for a stop-style level touched from the adverse side: the level,
/// or the open when the candle gapped through it.
fn adverse_fill(side: Side, level: f64, open: f64) -> f64 {
    match side {
        Side::Long if open <= level => open,
        Side::Short if open >= level => open,
        _ => level,
    }
}

/// Fill for a profit target: the level, or the better open on a gap.
fn favorable_fill(side: Side, level: f64, open: f64) -> f64 {
    match side {
        Side::Long if open >= level => open,
        Side::Short if open <= level => open,
        _ => level,
    }
}

fn touched_adverse(side: Side, level: f64, candle: &Candle) -> bool {
    match side {
        Side::Long => candle.low <= level,
        Side::Short => candle.high >= level,
    }
}

fn touched_favorable(side: Side, level: f64, candle: &Candle) -> bool {
    match side {
        Side::Long => candle.high >= level,
        Side::Short => candle.low <= level,
    }
}

/// Mark-to-market drawdown if the remaining size were closed at `price`.
pub fn mark_to_market_drawdown(position: &Position, inputs: &ExitInputs<'_>, price: f64, fee_rate: f64) -> f64 {
    if inputs.peak_capital <= 0.0 {
        return 0.0;
    }
    let unrealized = position.margin * position.remaining * return_rate(position, price, fee_rate);
    let equity = inputs.capital + unrealized;
    ((inputs.peak_capital - equity) / inputs.peak_capital).max(0.0)
}

pub fn evaluate_exit(position: &Position, rules: &ExitRules, inputs: &ExitInputs<'_>) -> Option<ExitDecision> {
    let side = position.side;
    let candle = inputs.candle;

    // 1. Forced exits
    let liq = liquidation_price(position, rules.maintenance_margin);
    if touched_adverse(side, liq, candle) {
        return Some(ExitDecision::full(
            CloseReason::Liquidation,
            adverse_fill(side, liq, candle.open),
        ));
    }
    if mark_to_market_drawdown(position, inputs, candle.close, rules.fee_rate) > rules.emergency_drawdown {
        return Some(ExitDecision::full(CloseReason::EmergencyDrawdown, candle.close));
    }
    if inputs.is_last {
        return Some(ExitDecision::full(CloseReason::EndOfData, candle.close));
    }

    // 2. Stop-loss
    let stop = position.stop_loss_price();
    if touched_adverse(side, stop, candle) {
        return Some(ExitDecision::full(
            CloseReason::StopLoss,
            adverse_fill(side, stop, candle.open),
        ));
    }

    // 3. Trailing stop
    if let Some(level) = position.trailing.as_ref().and_then(|t| t.level()) {
        if touched_adverse(side, level, candle) {
            return Some(ExitDecision::full(
                CloseReason::TrailingStop,
                adverse_fill(side, level, candle.open),
            ));
        }
    }

    // 4. Take-profit ladder
    if let Some(target) = position.next_target() {
        if touched_favorable(side, target.price, candle) {
            return Some(ExitDecision {
                reason: CloseReason::TakeProfit(position.next_take_profit),
                price: favorable_fill(side, target.price, candle.open),
                fraction: Some(target.close_fraction),
            });
        }
    }

    // 5. Time exit
    if let Some(max) = position.max_holding_candles {
        if position.candles_held(inputs.index) >= max {
            return Some(ExitDecision::full(CloseReason::MaxHolding, candle.close));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TakeProfitTarget;
    use crate::lifecycle::RatchetState;
    use chrono::{Duration, TimeZone, Utc};

    const RULES: ExitRules = ExitRules {
        fee_rate: 0.0,
        maintenance_margin: 0.0,
        emergency_drawdown: 0.5,
    };

    fn position(side: Side, leverage: f64) -> Position {
        let stop = match side {
            Side::Long => 98.0,
            Side::Short => 102.0,
        };
        let tp = match side {
            Side::Long => 105.0,
            Side::Short => 95.0,
        };
        Position {
            side,
            entry_price: 100.0,
            entry_index: 0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            notional: 1_000.0 * leverage,
            margin: 1_000.0,
            leverage,
            remaining: 1.0,
            stop_loss: RatchetState::with_level(side, stop),
            take_profits: vec![TakeProfitTarget {
                price: tp,
                close_fraction: 1.0,
            }],
            next_take_profit: 0,
            trailing: None,
            max_holding_candles: Some(10),
            breakeven_after_first_tp: false,
            strategy_id: "test".into(),
            confidence: 0.8,
        }
    }

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(1),
            open,
            high,
            low,
            close,
            1.0,
        )
    }

    fn eval(pos: &Position, c: &Candle, index: usize, is_last: bool) -> Option<ExitDecision> {
        let inputs = ExitInputs {
            index,
            candle: c,
            is_last,
            capital: 10_000.0,
            peak_capital: 10_000.0,
        };
        evaluate_exit(pos, &RULES, &inputs)
    }

    #[test]
    fn quiet_candle_has_no_exit() {
        assert_eq!(eval(&position(Side::Long, 2.0), &candle(100.0, 101.0, 99.0, 100.5), 1, false), None);
    }

    #[test]
    fn stop_beats_take_profit_on_same_candle() {
        let d = eval(&position(Side::Long, 2.0), &candle(100.0, 106.0, 97.0, 100.0), 1, false).unwrap();
        assert_eq!(d.reason, CloseReason::StopLoss);
        assert_eq!(d.price, 98.0);
    }

    #[test]
    fn end_of_data_beats_stop() {
        let d = eval(&position(Side::Long, 2.0), &candle(100.0, 101.0, 97.0, 97.5), 1, true).unwrap();
        assert_eq!(d.reason, CloseReason::EndOfData);
        assert_eq!(d.price, 97.5);
    }

    #[test]
    fn liquidation_beats_everything() {
        // 10x, no maintenance: liquidation at a 10% adverse move (price 90)
        let d = eval(&position(Side::Long, 10.0), &candle(100.0, 106.0, 89.0, 95.0), 1, true).unwrap();
        assert_eq!(d.reason, CloseReason::Liquidation);
        assert!((d.price - 90.0).abs() < 1e-9);
    }

    #[test]
    fn gap_through_stop_fills_at_open() {
        let d = eval(&position(Side::Long, 2.0), &candle(96.0, 96.5, 95.0, 96.0), 1, false).unwrap();
        assert_eq!(d.reason, CloseReason::StopLoss);
        assert_eq!(d.price, 96.0);
    }

    #[test]
    fn take_profit_fills_at_level_or_better_open() {
        let pos = position(Side::Long, 2.0);
        let d = eval(&pos, &candle(103.0, 105.5, 102.0, 104.0), 1, false).unwrap();
        assert_eq!(d.reason, CloseReason::TakeProfit(0));
        assert_eq!(d.price, 105.0);
        assert_eq!(d.fraction, Some(1.0));

        let gap = eval(&pos, &candle(107.0, 108.0, 106.0, 107.5), 1, false).unwrap();
        assert_eq!(gap.price, 107.0);
    }

    #[test]
    fn short_side_mirrors() {
        let pos = position(Side::Short, 2.0);
        let stop = eval(&pos, &candle(100.0, 102.5, 99.0, 101.0), 1, false).unwrap();
        assert_eq!(stop.reason, CloseReason::StopLoss);
        assert_eq!(stop.price, 102.0);

        let tp = eval(&pos, &candle(100.0, 100.5, 94.0, 95.5), 1, false).unwrap();
        assert_eq!(tp.reason, CloseReason::TakeProfit(0));
        assert_eq!(tp.price, 95.0);
    }

    #[test]
    fn trailing_stop_checked_after_stop_loss() {
        let mut pos = position(Side::Long, 2.0);
        let mut trailing = crate::domain::TrailingStop::new(
            crate::config::TrailingConfig {
                activation: 0.01,
                distance: 0.01,
                lock_breakeven: false,
            },
            Side::Long,
        );
        trailing.ratchet.apply(101.0);
        pos.trailing = Some(trailing);

        let d = eval(&pos, &candle(102.0, 102.5, 100.5, 101.0), 1, false).unwrap();
        assert_eq!(d.reason, CloseReason::TrailingStop);
        assert_eq!(d.price, 101.0);
    }

    #[test]
    fn max_holding_closes_at_close() {
        let pos = position(Side::Long, 2.0);
        assert_eq!(eval(&pos, &candle(100.0, 101.0, 99.0, 100.5), 9, false), None);
        let d = eval(&pos, &candle(100.0, 101.0, 99.0, 100.5), 10, false).unwrap();
        assert_eq!(d.reason, CloseReason::MaxHolding);
        assert_eq!(d.price, 100.5);
    }

    #[test]
    fn emergency_drawdown_uses_close() {
        // 5x long, close at 92 → -40% on a 1000 margin = -400 against 10_000 peak: 4% drawdown.
        let pos = position(Side::Long, 5.0);
        let rules = ExitRules {
            emergency_drawdown: 0.03,
            ..RULES
        };
        let c = candle(99.0, 99.5, 91.5, 92.0);
        let inputs = ExitInputs {
            index: 1,
            candle: &c,
            is_last: false,
            capital: 10_000.0,
            peak_capital: 10_000.0,
        };
        // Stop at 98 would also fire; emergency has priority.
        let d = evaluate_exit(&pos, &rules, &inputs).unwrap();
        assert_eq!(d.reason, CloseReason::EmergencyDrawdown);
        assert_eq!(d.price, 92.0);
    }

    #[test]
    fn return_rate_includes_fees_and_floor() {
        let pos = position(Side::Long, 10.0);
        // +1% × 10 − 2 × 0.001 × 10 = 0.08
        assert!((return_rate(&pos, 101.0, 0.001) - 0.08).abs() < 1e-12);
        assert_eq!(return_rate(&pos, 50.0, 0.0), -1.0);
    }
}
