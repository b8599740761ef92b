//! Oscillators and momentum kernels.

use super::ma::{ema, rma, sma};
use super::{nan_vec, window_valid};

/// Relative Strength Index.
///
/// Gain/loss split of the one-bar difference (NaN at index 0 to seed the
/// Wilder smoothing identically to a differentiated series), then
/// `100 − 100/(1 + rma(gain)/rma(loss))`. A zero average loss maps to 100
/// when gains exist and NaN otherwise.
pub fn rsi(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n == 0 {
        return out;
    }

    let mut gain = nan_vec(n);
    let mut loss = nan_vec(n);
    for i in 1..n {
        let d = src[i] - src[i - 1];
        gain[i] = if d > 0.0 { d } else { 0.0 };
        loss[i] = if d < 0.0 { -d } else { 0.0 };
    }

    let avg_gain = rma(&gain, length);
    let avg_loss = rma(&loss, length);

    for i in 0..n {
        if avg_gain[i].is_nan() || avg_loss[i].is_nan() {
            continue;
        }
        if avg_loss[i] == 0.0 {
            out[i] = if avg_gain[i] > 0.0 { 100.0 } else { f64::NAN };
        } else {
            let rs = avg_gain[i] / avg_loss[i];
            out[i] = 100.0 - 100.0 / (1.0 + rs);
        }
    }
    out
}

/// MACD: `(ema(fast) − ema(slow), ema(line, signal), line − signal)`.
pub fn macd(src: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ema_fast = ema(src, fast);
    let ema_slow = ema(src, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let histogram: Vec<f64> = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();
    (line, signal_line, histogram)
}

/// Stochastic oscillator.
///
/// `raw = 100·(close − lowest low)/(highest high − lowest low)` over the
/// trailing `length`; a zero range stays NaN. `%K` is the raw series
/// SMA-smoothed by `smooth_k` (no smoothing when 1), `%D` smooths `%K`
/// by `smooth_d`.
pub fn stoch(
    close: &[f64],
    high: &[f64],
    low: &[f64],
    length: usize,
    smooth_k: usize,
    smooth_d: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = close.len();
    let mut raw = nan_vec(n);
    if n >= length {
        for i in (length - 1)..n {
            let lo = i + 1 - length;
            let hw = &high[lo..=i];
            let lw = &low[lo..=i];
            if !window_valid(hw) || !window_valid(lw) || close[i].is_nan() {
                continue;
            }
            let hh = hw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let ll = lw.iter().cloned().fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            if range != 0.0 {
                raw[i] = 100.0 * (close[i] - ll) / range;
            }
        }
    }
    let k = if smooth_k > 1 { sma(&raw, smooth_k) } else { raw };
    let d = sma(&k, smooth_d);
    (k, d)
}

/// Commodity Channel Index: `(x − mean) / (0.015 · mean absolute deviation)`.
pub fn cci(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    for i in (length - 1)..n {
        let window = &src[i + 1 - length..=i];
        if !window_valid(window) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / length as f64;
        let mad = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / length as f64;
        if mad != 0.0 {
            out[i] = (src[i] - mean) / (0.015 * mad);
        }
    }
    out
}

/// Money Flow Index over typical price `(h+l+c)/3` and volume.
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], length: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = nan_vec(n);
    if n == 0 {
        return out;
    }

    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mut pos = nan_vec(n);
    let mut neg = nan_vec(n);
    for i in 1..n {
        let raw = typical[i] * volume[i];
        let d = typical[i] - typical[i - 1];
        if d > 0.0 {
            pos[i] = raw;
            neg[i] = 0.0;
        } else {
            pos[i] = 0.0;
            neg[i] = raw;
        }
    }

    if n <= length {
        return out;
    }
    for i in length..n {
        let lo = i + 1 - length;
        let pw = &pos[lo..=i];
        let nw = &neg[lo..=i];
        if !window_valid(pw) || !window_valid(nw) {
            continue;
        }
        let pos_mf: f64 = pw.iter().sum();
        let neg_mf: f64 = nw.iter().sum();
        if neg_mf == 0.0 {
            continue;
        }
        let ratio = pos_mf / neg_mf;
        out[i] = 100.0 - 100.0 / (1.0 + ratio);
    }
    out
}

/// Chande Momentum Oscillator: `100·(gains − losses)/(gains + losses)` over
/// rolling sums of the one-bar difference split.
pub fn cmo(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n == 0 {
        return out;
    }
    let mut gain = nan_vec(n);
    let mut loss = nan_vec(n);
    for i in 1..n {
        let d = src[i] - src[i - 1];
        gain[i] = if d > 0.0 { d } else { 0.0 };
        loss[i] = if d < 0.0 { -d } else { 0.0 };
    }
    for i in length..n {
        let lo = i + 1 - length;
        let gw = &gain[lo..=i];
        let lw = &loss[lo..=i];
        if !window_valid(gw) || !window_valid(lw) {
            continue;
        }
        let g: f64 = gw.iter().sum();
        let l: f64 = lw.iter().sum();
        if g + l != 0.0 {
            out[i] = 100.0 * (g - l) / (g + l);
        }
    }
    out
}

/// Rate of change in percent over `length` bars.
pub fn roc(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    for i in length..n {
        let prev = src[i - length];
        if prev.is_nan() || src[i].is_nan() || prev == 0.0 {
            continue;
        }
        out[i] = 100.0 * (src[i] - prev) / prev;
    }
    out
}

/// True Strength Index: double-smoothed momentum over double-smoothed
/// absolute momentum, in percent.
pub fn tsi(src: &[f64], short: usize, long: usize) -> Vec<f64> {
    let n = src.len();
    let mut delta = nan_vec(n);
    let mut delta_abs = nan_vec(n);
    for i in 1..n {
        let d = src[i] - src[i - 1];
        delta[i] = d;
        delta_abs[i] = d.abs();
    }
    let num = ema(&ema(&delta, long), short);
    let den = ema(&ema(&delta_abs, long), short);
    num.iter()
        .zip(&den)
        .map(|(a, b)| if *b != 0.0 { 100.0 * a / b } else { f64::NAN })
        .collect()
}

/// Momentum: price difference over `length` bars.
pub fn mom(src: &[f64], length: usize) -> Vec<f64> {
    super::util::change(src, length)
}

/// Williams %R: `-100·(hh − close)/(hh − ll)` over the trailing window.
pub fn wpr(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    for i in (length - 1)..n {
        let lo = i + 1 - length;
        let hw = &high[lo..=i];
        let lw = &low[lo..=i];
        if !window_valid(hw) || !window_valid(lw) || close[i].is_nan() {
            continue;
        }
        let hh = hw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let ll = lw.iter().cloned().fold(f64::INFINITY, f64::min);
        if hh - ll != 0.0 {
            out[i] = -100.0 * (hh - close[i]) / (hh - ll);
        }
    }
    out
}

/// Percent rank: share of the `length` prior values that the current value
/// equals or exceeds, in percent. Window is `length + 1` bars.
pub fn percentrank(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    for i in length..n {
        let window = &src[i - length..=i];
        if !window_valid(window) {
            continue;
        }
        let count = src[i - length..i].iter().filter(|v| src[i] >= **v).count();
        out[i] = count as f64 / length as f64 * 100.0;
    }
    out
}

/// Center of gravity: `-Σ xⱼ·(j+1) / Σ xⱼ` over the trailing window.
pub fn cog(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut out = nan_vec(n);
    if n < length {
        return out;
    }
    for i in (length - 1)..n {
        let window = &src[i + 1 - length..=i];
        if !window_valid(window) {
            continue;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for (j, v) in window.iter().enumerate() {
            num += -v * (j + 1) as f64;
            den += v;
        }
        if den != 0.0 {
            out[i] = num / den;
        }
    }
    out
}
