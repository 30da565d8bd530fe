//! Trend strength: normalized slope of a least-squares line over closes.

use super::sma::mean;

/// Least-squares slope of `values` against their index (0..n).
/// Returns 0.0 for fewer than two values.
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Fractional move implied by the regression line across the last
/// `lookback` closes: `slope × (n − 1) / mean(close)`.
///
/// Neutral: 0 when fewer than `lookback` (or two) closes are available.
pub fn trend_strength(closes: &[f64], lookback: usize) -> f64 {
    if lookback < 2 || closes.len() < lookback {
        return 0.0;
    }
    let window = &closes[closes.len() - lookback..];
    let avg = mean(window);
    if avg == 0.0 {
        return 0.0;
    }
    linear_regression_slope(window) * (lookback - 1) as f64 / avg
}
