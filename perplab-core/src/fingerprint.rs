//! Run fingerprinting: deterministic identification of configs and datasets.
//!
//! - `ConfigHash`: blake3 of the canonical JSON of an `EngineConfig`.
//! - `DatasetHash`: blake3 over every candle's timestamp and OHLCV bits.
//! - `RunFingerprint`: the pair plus a combined run id, for artifacts and logs.

use crate::config::EngineConfig;
use crate::domain::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn of(config: &EngineConfig) -> Self {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let json = serde_json::to_string(config).expect("EngineConfig must serialize");
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(candles: &[Candle]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for c in candles {
            hasher.update(&c.timestamp.timestamp_millis().to_le_bytes());
            for v in [c.open, c.high, c.low, c.close, c.volume] {
                hasher.update(&v.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one (config, dataset) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_id: String,
    pub strategy_id: String,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub candles: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl RunFingerprint {
    pub fn new(config: &EngineConfig, candles: &[Candle]) -> Self {
        let config_hash = ConfigHash::of(config);
        let dataset_hash = DatasetHash::of(candles);
        let run_id = blake3::hash(format!("{config_hash}:{dataset_hash}").as_bytes())
            .to_hex()
            .to_string();
        Self {
            run_id,
            strategy_id: config.signal.strategy_id.clone(),
            config_hash,
            dataset_hash,
            candles: candles.len(),
            first_timestamp: candles.first().map(|c| c.timestamp),
            last_timestamp: candles.last().map(|c| c.timestamp),
        }
    }

    /// First 12 hex characters of the run id, for directory names and logs.
    pub fn short_id(&self) -> &str {
        &self.run_id[..12]
    }
}
