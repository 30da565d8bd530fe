//! MACD: fast EMA minus slow EMA, with an EMA signal line over the MACD line.
//!
//! Needs `slow + signal - 1` closes for the signal line. Neutral: all zero.

use super::ema::ema_of_series;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD of the window, evaluated at its last close.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow + signal - 1 {
        return Macd::default();
    }

    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);

    // MACD line defined from the first index where the slow EMA exists.
    let line: Vec<f64> = fast_ema[slow - 1..]
        .iter()
        .zip(&slow_ema[slow - 1..])
        .map(|(f, s)| f - s)
        .collect();
    let signal_series = ema_of_series(&line, signal);

    let (Some(&line_now), Some(&signal_now)) = (line.last(), signal_series.last()) else {
        return Macd::default();
    };
    if !line_now.is_finite() || !signal_now.is_finite() {
        return Macd::default();
    }

    Macd {
        line: line_now,
        signal: signal_now,
        histogram: line_now - signal_now,
    }
}

/// MACD at every prefix: `out[k] == macd(&closes[..=k], fast, slow, signal)`.
pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Macd> {
    let n = closes.len();
    let mut out = vec![Macd::default(); n];
    if fast == 0 || slow == 0 || signal == 0 || n < slow + signal - 1 {
        return out;
    }

    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);
    let line: Vec<f64> = fast_ema[slow - 1..]
        .iter()
        .zip(&slow_ema[slow - 1..])
        .map(|(f, s)| f - s)
        .collect();
    let signal_series = ema_of_series(&line, signal);

    for k in (slow + signal - 2)..n {
        let (line_now, signal_now) = (line[k + 1 - slow], signal_series[k + 1 - slow]);
        if line_now.is_finite() && signal_now.is_finite() {
            out[k] = Macd {
                line: line_now,
                signal: signal_now,
                histogram: line_now - signal_now,
            };
        }
    }
    out
}
