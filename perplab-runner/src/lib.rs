//! PerpLab Runner: backtest orchestration on top of `perplab-core`.
//!
//! This crate provides:
//! - TOML run configs (preset + engine overrides + data source)
//! - Candle loading from JSON/CSV and deterministic synthetic generators
//! - Single-run orchestration with run fingerprints
//! - Parallel parameter sweeps ranked by fitness scores
//! - JSON/CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{DataSource, RunConfig, RunConfigError};
pub use data_loader::{load_candles, LoadError};
pub use export::{write_artifacts, ArtifactPaths};
pub use fitness::FitnessMetric;
pub use runner::{run_backtest, run_from_config, BacktestReport, RunError};
pub use sweep::{run_sweep, ParamGrid, SweepOutcome, SweepParams, SweepResults};
pub use synthetic::{Pattern, SyntheticSpec};
