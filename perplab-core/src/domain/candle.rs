//! The fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for one fixed time interval.
///
/// Produced by an external collaborator (file loader, synthetic generator).
/// The engine validates candles at ingestion and never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Rejected input data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("candle series is empty")]
    Empty,
    #[error("candle {index}: non-finite or non-positive price")]
    InvalidPrice { index: usize },
    #[error("candle {index}: OHLC invariant violated (o={open}, h={high}, l={low}, c={close})")]
    OhlcViolation {
        index: usize,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    #[error("candle {index}: negative or non-finite volume {volume}")]
    InvalidVolume { index: usize, volume: f64 },
    #[error("candle {index}: timestamp {timestamp} is not after previous {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the single-candle invariants, reporting `index` in the error.
    pub fn validate(&self, index: usize) -> Result<(), DataError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(DataError::InvalidPrice { index });
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(DataError::OhlcViolation {
                index,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(DataError::InvalidVolume {
                index,
                volume: self.volume,
            });
        }
        Ok(())
    }
}

/// Validate a whole series: non-empty, every candle sane, timestamps strictly increasing.
pub fn validate_series(candles: &[Candle]) -> Result<(), DataError> {
    if candles.is_empty() {
        return Err(DataError::Empty);
    }
    for (i, candle) in candles.iter().enumerate() {
        candle.validate(i)?;
        if i > 0 {
            let previous = candles[i - 1].timestamp;
            if candle.timestamp <= previous {
                return Err(DataError::NonIncreasingTimestamp {
                    index: i,
                    timestamp: candle.timestamp,
                    previous,
                });
            }
        }
    }
    Ok(())
}
