//! Signal generation: market data in, trade intent out.
//!
//! Signals must never depend on account state (capital, streaks, open
//! position). They are pure functions of the candle window, which ends at
//! the last *closed* candle before the decision.

pub mod generator;

pub use generator::{PrecomputedSignals, SignalGenerator};

use crate::domain::{Candle, Signal};

/// Source of entry signals for the engine.
///
/// # Invariants
/// - `generate()` sees only candles strictly before the decision candle
/// - `generate()` is deterministic for the same window
/// - `prepare(candles).signal_at(i) == generate(&candles[..i])`
pub trait SignalSource: Send + Sync {
    fn generate(&self, window: &[Candle]) -> Signal;

    /// Strategy identifier for trades and logs.
    fn name(&self) -> &str;

    /// Candles needed before a direction can be emitted.
    fn min_history(&self) -> usize;

    /// Per-run view over the full series. The default re-evaluates the
    /// window at every call; sources with expensive indicators override it.
    fn prepare<'a>(&'a self, candles: &'a [Candle]) -> Box<dyn PreparedSignals + 'a> {
        Box::new(WindowSignals { source: self, candles })
    }
}

/// Signals for the decision indices of one run.
pub trait PreparedSignals {
    /// Signal for a decision at candle `i`, from `candles[..i]` only.
    fn signal_at(&self, i: usize) -> Signal;
}

struct WindowSignals<'a, S: ?Sized> {
    source: &'a S,
    candles: &'a [Candle],
}

impl<S: SignalSource + ?Sized> PreparedSignals for WindowSignals<'_, S> {
    fn signal_at(&self, i: usize) -> Signal {
        self.source.generate(&self.candles[..i])
    }
}
