//! Indicator library: pure functions over a trailing window.
//!
//! Every function takes the window ending at the most recent *closed* candle
//! and returns a single value. When the window is shorter than the indicator
//! needs, a defined neutral value is returned instead of NaN (RSI 50, ATR 0,
//! MACD 0, volume ratio 1, ...). The signal generator relies on these values
//! being reproducible during warm-up.
//!
//! Series helpers (`ema_of_series`, `wilder_smooth`, `true_range`) are the
//! building blocks. The `*_series` functions evaluate an indicator at every
//! prefix in one pass: `rsi_series(c, p)[k] == rsi(&c[..=k], p)`. The engine
//! precomputes these once per run.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod trend;
pub mod volatility;

pub use atr::{atr, atr_series, true_range, wilder_smooth};
pub use ema::{ema, ema_of_series};
pub use macd::{macd, macd_series, Macd};
pub use rsi::{rsi, rsi_series, RSI_NEUTRAL};
pub use sma::{mean, sma};
pub use trend::{linear_regression_slope, trend_strength};
pub use volatility::{volatility, volume_ratio};

use crate::domain::Candle;

/// Closing prices of a candle window.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Volumes of a candle window.
pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}

/// Create synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000, one hour apart.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
