//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.
//! Neutral: the last available value when fewer than `period` values exist.

/// EMA series of the same length as `values`; indices before the seed are NaN.
///
/// Used by MACD, which needs the EMA of an arbitrary series.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    // Seed: SMA of first `period` values
    let mut sum = 0.0;
    for &v in values.iter().take(period) {
        if v.is_nan() {
            return result;
        }
        sum += v;
    }
    let seed = sum / period as f64;
    result[period - 1] = seed;

    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}

/// EMA of the whole window, evaluated at its last value.
pub fn ema(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return values.last().copied().unwrap_or(0.0);
    }
    ema_of_series(values, period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
        .unwrap_or(0.0)
}
