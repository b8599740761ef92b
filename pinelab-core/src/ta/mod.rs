//! Deterministic indicator kernels over contiguous `f64` slices.
//!
//! Every kernel preserves input length and positional alignment: positions
//! without enough history hold NaN. Rolling-window kernels produce a value
//! only when the whole trailing window is NaN-free; recursive kernels
//! (EMA, RMA) carry their previous output across NaN inputs; cumulative
//! kernels carry the running sum across NaN gaps and leave NaN at the gap.
//!
//! Kernels never validate their length arguments — the evaluator rejects
//! non-positive periods before dispatch (fatal to the backtest).

pub mod ma;
pub mod momentum;
pub mod trend;
pub mod util;
pub mod volatility;
pub mod volume;

pub use ma::{alma, ema, hma, rma, sma, swma, vwma, wma};
pub use momentum::{
    cci, cmo, cog, macd, mfi, mom, percentrank, roc, rsi, stoch, tsi, wpr,
};
pub use trend::{linreg, sar, supertrend};
pub use util::{
    change, cross, crossover, crossunder, cum, falling, highest, lowest, median, nz,
    range_indicator, rising,
};
pub use volatility::{atr, bb, bbw, dmi, kc, kcw, stdev, true_range};
pub use volume::{accdist, obv, pvt, vwap, wad};

/// NaN-filled output buffer of length `n`.
pub(crate) fn nan_vec(n: usize) -> Vec<f64> {
    vec![f64::NAN; n]
}

/// True when the window holds no NaN.
pub(crate) fn window_valid(window: &[f64]) -> bool {
    window.iter().all(|v| !v.is_nan())
}
