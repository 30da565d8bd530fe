//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Needs `period + 1` closes. Neutral: 50.
//! Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0; both zero → 50.

pub const RSI_NEUTRAL: f64 = 50.0;

/// RSI of the window, evaluated at its last close.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return RSI_NEUTRAL;
    }

    // Seed: average gain and average loss over the first `period` changes
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let ch = closes[i] - closes[i - 1];
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    // Wilder smoothing for subsequent changes
    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = closes[i] - closes[i - 1];
        let gain = ch.max(0.0);
        let loss = (-ch).max(0.0);
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
    }

    compute_rsi(avg_gain, avg_loss)
}

/// RSI at every prefix: `out[k] == rsi(&closes[..=k], period)`.
///
/// One pass instead of one per prefix; the arithmetic is the same.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![RSI_NEUTRAL; n];
    if period == 0 || n < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let ch = closes[i] - closes[i - 1];
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = compute_rsi(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = closes[i] - closes[i - 1];
        avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * avg_loss;
        out[i] = compute_rsi(avg_gain, avg_loss);
    }
    out
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        RSI_NEUTRAL
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
