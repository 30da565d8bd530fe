//! Backtest runner: wires config, data and the engine, and stamps results.
//!
//! Two entry points:
//! - `run_backtest()`: pre-loaded candles plus a resolved `EngineConfig`.
//! - `run_from_config()`: resolves a `RunConfig` (preset, overrides, data source) first.

use chrono::{DateTime, Utc};
use perplab_core::config::{ConfigError, EngineConfig};
use perplab_core::domain::{Candle, DataError};
use perplab_core::engine::{Engine, RunResult};
use perplab_core::fingerprint::RunFingerprint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::config::{DataSource, RunConfig, RunConfigError};
use crate::data_loader::{load_candles, LoadError};
use crate::synthetic;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    RunConfig(#[from] RunConfigError),
    #[error("engine config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("candle data error: {0}")]
    Data(#[from] DataError),
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (max supported: {supported})")]
    SchemaVersion { found: u32, supported: u32 },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// One finished run plus everything needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub fingerprint: RunFingerprint,
    pub config: EngineConfig,
    /// Whether the candles came from a synthetic generator.
    pub synthetic: bool,
    pub completed_at: DateTime<Utc>,
    pub result: RunResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run the engine over pre-loaded candles.
pub fn run_backtest(name: &str, config: EngineConfig, candles: &[Candle], synthetic: bool) -> Result<BacktestReport, RunError> {
    let fingerprint = RunFingerprint::new(&config, candles);
    let engine = Engine::new(config)?;
    let result = engine.run(candles)?;

    let m = &result.metrics;
    info!(
        run = name,
        id = fingerprint.short_id(),
        strategy = %fingerprint.strategy_id,
        candles = candles.len(),
        trades = m.total_trades,
        win_rate = m.win_rate,
        total_return = m.total_return,
        sharpe = m.sharpe,
        max_drawdown = m.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        name: name.to_string(),
        fingerprint,
        config: engine.config().clone(),
        synthetic,
        completed_at: Utc::now(),
        result,
    })
}

/// Candles for a resolved data source, and whether they are synthetic.
pub fn load_source(source: &DataSource) -> Result<(Vec<Candle>, bool), RunError> {
    match source {
        DataSource::File(path) => Ok((load_candles(path)?, false)),
        DataSource::Synthetic(spec) => Ok((synthetic::generate(spec), true)),
    }
}

/// Resolve a `RunConfig` and run it.
pub fn run_from_config(run: &RunConfig) -> Result<BacktestReport, RunError> {
    let config = run.engine_config()?;
    let (candles, is_synthetic) = load_source(&run.data_source()?)?;
    info!(run = %run.name, preset = %run.preset, candles = candles.len(), synthetic = is_synthetic, "starting backtest");
    run_backtest(&run.name, config, &candles, is_synthetic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{Pattern, SyntheticSpec};

    fn synthetic_run() -> RunConfig {
        RunConfig::from_toml_str(
            r#"
            name = "walk"
            preset = "aggressive"
            [data.synthetic]
            pattern = "random_walk"
            candles = 1500
            volatility = 0.008
            seed = 11
            "#,
        )
        .unwrap()
    }

    #[test]
    fn run_from_synthetic_config() {
        let report = run_from_config(&synthetic_run()).unwrap();
        assert_eq!(report.name, "walk");
        assert!(report.synthetic);
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        assert_eq!(report.fingerprint.candles, 1500);
        assert_eq!(report.config.signal.strategy_id, "aggressive");
        assert_eq!(report.result.diagnostics.candles, 1500);
    }

    #[test]
    fn identical_inputs_share_a_run_id() {
        let a = run_from_config(&synthetic_run()).unwrap();
        let b = run_from_config(&synthetic_run()).unwrap();
        assert_eq!(a.fingerprint.run_id, b.fingerprint.run_id);
        assert_eq!(a.result, b.result);
    }

    #[test]
    fn empty_series_is_a_data_error() {
        let spec = SyntheticSpec {
            pattern: Pattern::Linear,
            candles: 0,
            ..SyntheticSpec::default()
        };
        let candles = synthetic::generate(&spec);
        let err = run_backtest("empty", EngineConfig::default(), &candles, true).unwrap_err();
        assert!(matches!(err, RunError::Data(DataError::Empty)));
    }

    #[test]
    fn invalid_engine_config_is_reported() {
        let mut config = EngineConfig::default();
        config.equity_sample_every = 0;
        let candles = synthetic::generate(&SyntheticSpec::default());
        let err = run_backtest("bad", config, &candles, true).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let mut run = RunConfig::default();
        run.data.path = Some("/nonexistent/candles.csv".into());
        let err = run_from_config(&run).unwrap_err();
        assert!(matches!(err, RunError::Load(LoadError::Io { .. })));
    }
}
