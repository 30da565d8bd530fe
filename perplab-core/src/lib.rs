//! PerpLab Core: leveraged perpetual-futures backtest engine.
//!
//! - Domain types (candles, signals, positions, trades, account state)
//! - Indicator library with neutral warm-up values
//! - Signal generator driven by a strategy profile
//! - Risk & sizing manager producing execution plans
//! - Position lifecycle with ratcheted stops and a take-profit ladder
//! - Candle-by-candle engine with circuit breakers
//! - Metrics aggregator, presets and run fingerprints
//!
//! The engine is a pure function of (candles, config): no I/O, no randomness.

pub mod config;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod lifecycle;
pub mod metrics;
pub mod presets;
pub mod risk;
pub mod signals;

pub use config::{ConfigError, EngineConfig};
pub use domain::{Candle, DataError};
pub use engine::{Engine, RunResult};
pub use metrics::PerformanceMetrics;
