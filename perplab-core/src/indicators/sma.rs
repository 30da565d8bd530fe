//! Simple Moving Average (SMA).
//!
//! Mean of the last `period` values.
//! Neutral: the last available value (0.0 for an empty window).

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// SMA of the trailing `period` values of `values`.
pub fn sma(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return values.last().copied().unwrap_or(0.0);
    }
    mean(&values[values.len() - period..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_uses_trailing_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx(sma(&values, 3), 4.0, DEFAULT_EPSILON);
        assert_approx(sma(&values, 5), 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_short_window_is_last_value() {
        assert_approx(sma(&[7.0, 8.0], 5), 8.0, DEFAULT_EPSILON);
        assert_eq!(sma(&[], 5), 0.0);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }
}
