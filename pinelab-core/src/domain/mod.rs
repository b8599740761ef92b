//! Domain types shared by the compiler, kernels, engine and data layer.

pub mod frame;
pub mod timeframe;

pub use frame::OhlcvFrame;
pub use timeframe::{Timeframe, TimeframeError, ALL_TIMEFRAMES};
