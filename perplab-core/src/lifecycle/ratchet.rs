//! Ratchet for stop levels.
//!
//! A stop may tighten, never loosen: for longs the level only rises, for
//! shorts it only falls. Both the stop-loss and the trailing stop go through
//! this type, so no code path can move a stop against the position.

use crate::domain::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    /// Current level (high-water mark for longs, low-water mark for shorts).
    current_level: Option<f64>,
    side: Side,
}

impl RatchetState {
    /// Unset ratchet; the first `apply` initializes it.
    pub fn new(side: Side) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    pub fn with_level(side: Side, level: f64) -> Self {
        Self {
            current_level: Some(level),
            side,
        }
    }

    /// Propose a new level; returns the level after ratcheting.
    ///
    /// ```
    /// use perplab_core::domain::Side;
    /// use perplab_core::lifecycle::RatchetState;
    ///
    /// let mut stop = RatchetState::with_level(Side::Long, 95.0);
    /// assert_eq!(stop.apply(100.0), 100.0);
    /// assert_eq!(stop.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let next = match self.current_level {
            None => proposed,
            Some(current) if self.side.is_better(proposed, current) => proposed,
            Some(current) => current,
        };
        self.current_level = Some(next);
        next
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_tightening_allowed() {
        let mut ratchet = RatchetState::with_level(Side::Long, 95.0);
        assert_eq!(ratchet.apply(100.0), 100.0);
        assert_eq!(ratchet.current_level(), Some(100.0));
    }

    #[test]
    fn long_loosening_blocked() {
        let mut ratchet = RatchetState::with_level(Side::Long, 100.0);
        assert_eq!(ratchet.apply(90.0), 100.0);
    }

    #[test]
    fn short_tightening_allowed() {
        let mut ratchet = RatchetState::with_level(Side::Short, 105.0);
        assert_eq!(ratchet.apply(100.0), 100.0);
    }

    #[test]
    fn short_loosening_blocked() {
        let mut ratchet = RatchetState::with_level(Side::Short, 100.0);
        assert_eq!(ratchet.apply(110.0), 100.0);
    }

    #[test]
    fn first_apply_initializes() {
        let mut ratchet = RatchetState::new(Side::Long);
        assert_eq!(ratchet.current_level(), None);
        assert_eq!(ratchet.apply(95.0), 95.0);
        assert_eq!(ratchet.current_level(), Some(95.0));
    }

    #[test]
    fn volatility_expansion_does_not_loosen() {
        // Price rose to 110 and ATR doubled: proposed 110 - 2*10 = 90 is looser than 95
        let mut ratchet = RatchetState::with_level(Side::Long, 95.0);
        assert_eq!(ratchet.apply(90.0), 95.0);
    }
}
