//! Moving averages: simple, exponential, Wilder, weighted, volume-weighted,
//! Hull, Arnaud Legoux, symmetric.

use super::{nan_vec, window_valid};

/// Simple moving average over the trailing `length` values.
///
/// NaN until `length - 1` and wherever the window contains a NaN.
pub fn sma(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    for i in (length - 1)..n {
        let window = &src[i + 1 - length..=i];
        if window_valid(window) {
            out[i] = window.iter().sum::<f64>() / length as f64;
        }
    }
    out
}

/// Exponential moving average, alpha = 2 / (length + 1), seeded at `src[0]`.
///
/// A NaN input carries the previous output forward; a NaN previous output
/// restarts from the current input. Pure recurrence, no bias correction.
pub fn ema(src: &[f64], length: usize) -> Vec<f64> {
    ewm(src, 2.0 / (length as f64 + 1.0))
}

/// Wilder's smoothing, alpha = 1 / length. Used by RSI, ATR, DMI.
pub fn rma(src: &[f64], length: usize) -> Vec<f64> {
    ewm(src, 1.0 / length as f64)
}

fn ewm(src: &[f64], alpha: f64) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n == 0 {
        return out;
    }
    out[0] = src[0];
    for i in 1..n {
        if src[i].is_nan() {
            out[i] = out[i - 1];
        } else if out[i - 1].is_nan() {
            out[i] = src[i];
        } else {
            out[i] = alpha * src[i] + (1.0 - alpha) * out[i - 1];
        }
    }
    out
}

/// Weighted moving average: weights 1..=length, normalizer L(L+1)/2.
pub fn wma(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    let denom = (length * (length + 1)) as f64 / 2.0;
    for i in (length - 1)..n {
        let mut sum = 0.0;
        for j in 0..length {
            sum += src[i + 1 - length + j] * (j + 1) as f64;
        }
        out[i] = sum / denom;
    }
    out
}

/// Volume-weighted moving average.
pub fn vwma(src: &[f64], volume: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    for i in (length - 1)..n {
        let lo = i + 1 - length;
        let sv = &src[lo..=i];
        let vv = &volume[lo..=i];
        if !window_valid(sv) || !window_valid(vv) {
            continue;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for j in 0..length {
            num += sv[j] * vv[j];
            den += vv[j];
        }
        if den != 0.0 {
            out[i] = num / den;
        }
    }
    out
}

/// Hull moving average: WMA(2·WMA(L/2) − WMA(L), √L).
pub fn hma(src: &[f64], length: usize) -> Vec<f64> {
    let half = (length / 2).max(1);
    let sqrt_len = ((length as f64).sqrt() as usize).max(1);
    let wma_half = wma(src, half);
    let wma_full = wma(src, length);
    let diff: Vec<f64> = wma_half
        .iter()
        .zip(&wma_full)
        .map(|(h, f)| 2.0 * h - f)
        .collect();
    wma(&diff, sqrt_len)
}

/// Arnaud Legoux moving average with Gaussian weights.
///
/// `m = offset · (L − 1)`, `s = L / sigma`, weights normalized over the window.
pub fn alma(src: &[f64], length: usize, offset: f64, sigma: f64) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    let m = offset * (length as f64 - 1.0);
    let s = length as f64 / sigma;

    let mut weights = Vec::with_capacity(length);
    let mut w_sum = 0.0;
    for k in 0..length {
        let w = (-((k as f64 - m).powi(2)) / (2.0 * s * s)).exp();
        weights.push(w);
        w_sum += w;
    }
    for w in &mut weights {
        *w /= w_sum;
    }

    for i in (length - 1)..n {
        let mut v = 0.0;
        for j in 0..length {
            v += src[i + 1 - length + j] * weights[j];
        }
        out[i] = v;
    }
    out
}

/// Symmetric weighted moving average: fixed window of 4, weights 1,2,2,1 over 6.
pub fn swma(src: &[f64]) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    for i in 3..n {
        out[i] = (src[i - 3] + 2.0 * src[i - 2] + 2.0 * src[i - 1] + src[i]) / 6.0;
    }
    out
}
