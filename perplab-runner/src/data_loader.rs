//! Candle loading from JSON and CSV files.
//!
//! Accepted layouts:
//! - JSON: an array of `{timestamp, open, high, low, close, volume}` objects
//! - CSV: header `timestamp,open,high,low,close,volume`
//!
//! Timestamps are RFC 3339 strings or integer epoch milliseconds. Every
//! loaded series passes the engine's validation before it is returned.

use chrono::{DateTime, TimeZone, Utc};
use perplab_core::domain::{validate_series, Candle, DataError};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported candle file '{0}' (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid JSON candles: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV candles: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// File layout, chosen from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleFormat {
    Json,
    Csv,
}

impl CandleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawCandle<T> {
    timestamp: T,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl<T> RawCandle<T> {
    fn into_candle(self, timestamp: DateTime<Utc>) -> Candle {
        Candle::new(timestamp, self.open, self.high, self.low, self.close, self.volume)
    }
}

/// Load and validate a candle file.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let format = CandleFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = match format {
        CandleFormat::Json => parse_json(&text)?,
        CandleFormat::Csv => parse_csv(text.as_bytes())?,
    };
    debug!(path = %path.display(), candles = candles.len(), "candles loaded");
    Ok(candles)
}

/// Parse and validate a JSON candle array.
pub fn parse_json(text: &str) -> Result<Vec<Candle>, LoadError> {
    let raw: Vec<RawCandle<RawTimestamp>> = serde_json::from_str(text)?;
    let candles = raw
        .into_iter()
        .enumerate()
        .map(|(row, r)| {
            let ts = match &r.timestamp {
                RawTimestamp::Millis(ms) => from_millis(row, *ms)?,
                RawTimestamp::Text(s) => parse_timestamp(row, s)?,
            };
            Ok(r.into_candle(ts))
        })
        .collect::<Result<Vec<_>, LoadError>>()?;
    validate_series(&candles)?;
    Ok(candles)
}

/// Parse and validate CSV candles with a header row.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Candle>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles = Vec::new();
    for (row, record) in rdr.deserialize::<RawCandle<String>>().enumerate() {
        let raw = record?;
        let ts = parse_timestamp(row, &raw.timestamp)?;
        candles.push(raw.into_candle(ts));
    }
    validate_series(&candles)?;
    Ok(candles)
}

/// RFC 3339 text or integer epoch milliseconds.
pub fn parse_timestamp(row: usize, value: &str) -> Result<DateTime<Utc>, LoadError> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return from_millis(row, ms);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LoadError::Timestamp {
            row,
            value: value.to_string(),
        })
}

fn from_millis(row: usize, ms: i64) -> Result<DateTime<Utc>, LoadError> {
    Utc.timestamp_millis_opt(ms).single().ok_or(LoadError::Timestamp {
        row,
        value: ms.to_string(),
    })
}
