//! Backtest driver: the candle-by-candle event loop and its breakers.
//!
//! Per candle:
//! 0. Roll the UTC day/hour clock; reset next-day breakers on a new day
//! 1. Evaluate exits on the open position; book realized trades
//! 2. Re-check circuit breakers after a realized trade
//! 3. If flat, past warm-up, not the final candle, and breakers allow:
//!    signal over `candles[..i]`, sizing, entry at `candles[i].open`
//! 4. Sample the equity curve at the configured cadence

pub mod circuit_breaker;
pub mod event_loop;
pub mod state;

pub use circuit_breaker::{BreakerKind, BreakerState, BreakerTrip, CircuitBreakers};
pub use event_loop::Engine;
pub use state::{RunDiagnostics, RunResult};
