//! Realized volatility and volume ratio.

use super::sma::mean;

/// Population standard deviation of the last `period` close-to-close returns.
///
/// Needs `period + 1` closes. Neutral: 0.
pub fn volatility(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 0.0;
    }
    let window = &closes[closes.len() - period - 1..];
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    let m = mean(&returns);
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    var.sqrt()
}

/// Mean of the last `short` volumes divided by the mean of the last `long`.
///
/// Needs `long` volumes. Neutral: 1 (also when the long average is zero).
pub fn volume_ratio(volumes: &[f64], short: usize, long: usize) -> f64 {
    if short == 0 || long == 0 || volumes.len() < long.max(short) {
        return 1.0;
    }
    let long_avg = mean(&volumes[volumes.len() - long..]);
    if long_avg <= 0.0 {
        return 1.0;
    }
    mean(&volumes[volumes.len() - short..]) / long_avg
}
