//! Volatility kernels: true range, ATR, Bollinger, Keltner, stdev, DMI.

use super::ma::{ema, rma, sma};
use super::{nan_vec, window_valid};

/// True range per bar: `max(h−l, |h−c₋₁|, |l−c₋₁|)`; the first bar has no
/// previous close and uses `h−l`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len();
    let mut tr = nan_vec(n);
    if n == 0 {
        return tr;
    }
    tr[0] = high[0] - low[0];
    for i in 1..n {
        let hl = high[i] - low[i];
        let hc = (high[i] - close[i - 1]).abs();
        let lc = (low[i] - close[i - 1]).abs();
        tr[i] = hl.max(hc).max(lc);
    }
    tr
}

/// Average True Range: Wilder smoothing of the true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    rma(&true_range(high, low, close), length)
}

/// Rolling standard deviation. `biased` selects the population estimator
/// (divide by L); otherwise the sample estimator (divide by L−1).
pub fn stdev(src: &[f64], length: usize, biased: bool) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    let ddof = if biased { 0 } else { 1 };
    if length <= ddof {
        return out;
    }
    for i in (length - 1)..n {
        let window = &src[i + 1 - length..=i];
        if !window_valid(window) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / length as f64;
        let ss: f64 = window.iter().map(|v| (v - mean).powi(2)).sum();
        out[i] = (ss / (length - ddof) as f64).sqrt();
    }
    out
}

/// Bollinger Bands. Returns `(middle, upper, lower)` with population sigma.
pub fn bb(src: &[f64], length: usize, mult: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma(src, length);
    let sd = stdev(src, length, true);
    let upper: Vec<f64> = middle.iter().zip(&sd).map(|(m, s)| m + mult * s).collect();
    let lower: Vec<f64> = middle.iter().zip(&sd).map(|(m, s)| m - mult * s).collect();
    (middle, upper, lower)
}

/// Bollinger Band Width: `(upper − lower) / middle`.
pub fn bbw(src: &[f64], length: usize, mult: f64) -> Vec<f64> {
    let (middle, upper, lower) = bb(src, length, mult);
    (0..src.len())
        .map(|i| {
            if middle[i] != 0.0 {
                (upper[i] - lower[i]) / middle[i]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Keltner Channel. Returns `(middle, upper, lower)` — EMA of the source
/// with ATR bands.
pub fn kc(
    src: &[f64],
    high: &[f64],
    low: &[f64],
    close: &[f64],
    length: usize,
    mult: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = ema(src, length);
    let atr_val = atr(high, low, close, length);
    let upper: Vec<f64> = middle.iter().zip(&atr_val).map(|(m, a)| m + mult * a).collect();
    let lower: Vec<f64> = middle.iter().zip(&atr_val).map(|(m, a)| m - mult * a).collect();
    (middle, upper, lower)
}

/// Keltner Channel Width: `(upper − lower) / middle`.
pub fn kcw(
    src: &[f64],
    high: &[f64],
    low: &[f64],
    close: &[f64],
    length: usize,
    mult: f64,
) -> Vec<f64> {
    let (middle, upper, lower) = kc(src, high, low, close, length, mult);
    (0..src.len())
        .map(|i| {
            if middle[i] != 0.0 {
                (upper[i] - lower[i]) / middle[i]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Directional Movement Index. Returns `(+DI, −DI, ADX)`.
///
/// The directional-movement series seed NaN at index 0 (as a
/// differentiated series would), so the Wilder smoothing starts
/// identically to the reference. A zero or NaN ATR propagates NaN.
pub fn dmi(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    di_length: usize,
    adx_smoothing: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = high.len();
    let mut plus_dm = nan_vec(n);
    let mut minus_dm = nan_vec(n);
    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let atr_val = atr(high, low, close, di_length);
    let sm_plus = rma(&plus_dm, di_length);
    let sm_minus = rma(&minus_dm, di_length);

    let mut plus_di = nan_vec(n);
    let mut minus_di = nan_vec(n);
    let mut dx = nan_vec(n);
    for i in 0..n {
        if atr_val[i].is_nan() || atr_val[i] == 0.0 {
            continue;
        }
        if !sm_plus[i].is_nan() {
            plus_di[i] = 100.0 * sm_plus[i] / atr_val[i];
        }
        if !sm_minus[i].is_nan() {
            minus_di[i] = 100.0 * sm_minus[i] / atr_val[i];
        }
        if !plus_di[i].is_nan() && !minus_di[i].is_nan() {
            let sum = plus_di[i] + minus_di[i];
            if sum != 0.0 {
                dx[i] = 100.0 * (plus_di[i] - minus_di[i]).abs() / sum;
            }
        }
    }

    let adx = rma(&dx, adx_smoothing);
    (plus_di, minus_di, adx)
}
