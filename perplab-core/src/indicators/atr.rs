//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Needs `period + 1` candles (TR[0] has no previous close). Neutral: 0.

use crate::domain::Candle;

/// True Range series of the window.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    let Some(first) = candles.first() else {
        return tr;
    };
    tr.push(first.high - first.low);

    for pair in candles.windows(2) {
        let (prev, c) = (&pair[0], &pair[1]);
        let pc = prev.close;
        tr.push((c.high - c.low).max((c.high - pc).abs()).max((c.low - pc).abs()));
    }

    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
/// Seed: mean of the first `period` values. Indices before the seed are NaN.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in period..n {
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

/// ATR of the window, evaluated at its last candle.
pub fn atr(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period + 1 {
        return 0.0;
    }
    // Skip TR[0]: it is only high-low, not a proper true range.
    let tr = true_range(candles);
    wilder_smooth(&tr[1..], period)
        .last()
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// ATR at every prefix: `out[k] == atr(&candles[..=k], period)`.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut out = vec![0.0; n];
    if period == 0 || n < period + 1 {
        return out;
    }
    let tr = true_range(candles);
    let smoothed = wilder_smooth(&tr[1..], period);
    for k in period..n {
        let v = smoothed[k - 1];
        if v.is_finite() {
            out[k] = v;
        }
    }
    out
}
