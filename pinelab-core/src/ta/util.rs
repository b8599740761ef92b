//! Lookback utilities and cross detection.

use super::{nan_vec, window_valid};

/// Highest value over the trailing window.
pub fn highest(src: &[f64], length: usize) -> Vec<f64> {
    rolling(src, length, |w| w.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
}

/// Lowest value over the trailing window.
pub fn lowest(src: &[f64], length: usize) -> Vec<f64> {
    rolling(src, length, |w| w.iter().cloned().fold(f64::INFINITY, f64::min))
}

/// Difference against the value `length` bars back.
pub fn change(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    for i in length..n {
        out[i] = src[i] - src[i - length];
    }
    out
}

/// Rolling median.
pub fn median(src: &[f64], length: usize) -> Vec<f64> {
    rolling(src, length, |w| {
        let mut sorted = w.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    })
}

/// Highest minus lowest over the trailing window.
///
/// Named `range_indicator` because the source-facing spelling collides
/// with the language range type.
pub fn range_indicator(src: &[f64], length: usize) -> Vec<f64> {
    let hi = highest(src, length);
    let lo = lowest(src, length);
    hi.iter().zip(&lo).map(|(h, l)| h - l).collect()
}

/// 1.0 where the source rose on each of the last `length` bars.
pub fn rising(src: &[f64], length: usize) -> Vec<f64> {
    consecutive(src, length, |d| d > 0.0)
}

/// 1.0 where the source fell on each of the last `length` bars.
pub fn falling(src: &[f64], length: usize) -> Vec<f64> {
    consecutive(src, length, |d| d < 0.0)
}

/// Cumulative sum.
pub fn cum(src: &[f64]) -> Vec<f64> {
    let mut out = nan_vec(src.len());
    let mut acc = 0.0;
    for (i, v) in src.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        acc += v;
        out[i] = acc;
    }
    out
}

/// 1.0 on bars where `a` crosses above `b`: `a > b` and previously `a ≤ b`.
/// NaN on either side of either bar yields 0.0.
pub fn crossover(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    let mut out = vec![0.0; n];
    for i in 1..n {
        let above = a[i] > b[i];
        let was_not_above = a[i - 1] <= b[i - 1];
        out[i] = if above && was_not_above { 1.0 } else { 0.0 };
    }
    out
}

/// 1.0 on bars where `a` crosses below `b`.
pub fn crossunder(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    let mut out = vec![0.0; n];
    for i in 1..n {
        let below = a[i] < b[i];
        let was_not_below = a[i - 1] >= b[i - 1];
        out[i] = if below && was_not_below { 1.0 } else { 0.0 };
    }
    out
}

/// 1.0 on bars where `a` crosses `b` in either direction.
pub fn cross(a: &[f64], b: &[f64]) -> Vec<f64> {
    let over = crossover(a, b);
    let under = crossunder(a, b);
    over.iter()
        .zip(&under)
        .map(|(o, u)| if *o != 0.0 || *u != 0.0 { 1.0 } else { 0.0 })
        .collect()
}

/// Replace NaN with `replacement`.
pub fn nz(src: &[f64], replacement: f64) -> Vec<f64> {
    src.iter()
        .map(|v| if v.is_nan() { replacement } else { *v })
        .collect()
}

fn rolling(src: &[f64], length: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length || length == 0 {
        return out;
    }
    for i in (length - 1)..n {
        let window = &src[i + 1 - length..=i];
        if window_valid(window) {
            out[i] = f(window);
        }
    }
    out
}

fn consecutive(src: &[f64], length: usize, pred: impl Fn(f64) -> bool) -> Vec<f64> {
    let n = src.len();
    let mut out = vec![0.0; n];
    for i in length..n {
        let mut ok = true;
        for j in (i - length + 1)..=i {
            let d = src[j] - src[j - 1];
            if d.is_nan() || !pred(d) {
                ok = false;
                break;
            }
        }
        out[i] = if ok { 1.0 } else { 0.0 };
    }
    out
}
