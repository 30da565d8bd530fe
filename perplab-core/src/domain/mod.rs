//! Domain types for PerpLab

pub mod account;
pub mod candle;
pub mod position;
pub mod signal;
pub mod trade;

pub use account::{AccountState, EquityPoint};
pub use candle::{validate_series, Candle, DataError};
pub use position::{Position, Side, TakeProfitTarget, TrailingStop, SIZE_EPSILON};
pub use signal::{Direction, IndicatorSnapshot, Signal};
pub use trade::{CloseReason, Trade};
