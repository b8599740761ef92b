//! Windowed-recompute magnifier.
//!
//! For each higher-timeframe bar past warmup, iterate its sub-bars at the
//! magnifier resolution, maintain the forming bar (open fixed, high/low
//! running extremes, close current, volume cumulative), re-run the
//! strategy on a sliding window whose trailing rows are completed chart
//! bars, and record each transition at the exact sub-bar where it first
//! fires. One window buffer is allocated per run and its last row
//! overwritten per sub-bar.

use std::collections::HashMap;

use crate::domain::{OhlcvFrame, Timeframe};
use crate::pine::eval::TableView;
use crate::pine::{CompiledStrategy, ParamValue, SignalVectors};

use super::progress::{CancelToken, ProgressSink};
use super::EngineError;

/// Default target number of sub-bars per chart bar.
pub const DEFAULT_TARGET_TICKS: u32 = 10;

/// Which routine the inner loop invokes. Both must produce identical
/// booleans on identical input; `Step` skips the per-sub-bar signal-vector
/// allocation of the batch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MagnifierBackend {
    #[default]
    Step,
    BatchOnWindow,
}

/// Pre-allocated `(window + forming row) x 5` buffer, reused across bars.
struct WindowBuf {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl WindowBuf {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            open: Vec::with_capacity(capacity),
            high: Vec::with_capacity(capacity),
            low: Vec::with_capacity(capacity),
            close: Vec::with_capacity(capacity),
            volume: Vec::with_capacity(capacity),
        }
    }

    /// Fill with completed chart rows `[start, end)` plus one placeholder
    /// forming row.
    fn load_completed(&mut self, frame: &OhlcvFrame, start: usize, end: usize) {
        self.open.clear();
        self.high.clear();
        self.low.clear();
        self.close.clear();
        self.volume.clear();
        self.open.extend_from_slice(&frame.open[start..end]);
        self.high.extend_from_slice(&frame.high[start..end]);
        self.low.extend_from_slice(&frame.low[start..end]);
        self.close.extend_from_slice(&frame.close[start..end]);
        self.volume.extend_from_slice(&frame.volume[start..end]);
        self.open.push(f64::NAN);
        self.high.push(f64::NAN);
        self.low.push(f64::NAN);
        self.close.push(f64::NAN);
        self.volume.push(f64::NAN);
    }

    /// Overwrite the forming row in place.
    fn set_forming(&mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        let last = self.open.len() - 1;
        self.open[last] = open;
        self.high[last] = high;
        self.low[last] = low;
        self.close[last] = close;
        self.volume[last] = volume;
    }

    fn view(&self) -> TableView<'_> {
        TableView {
            open: &self.open,
            high: &self.high,
            low: &self.low,
            close: &self.close,
            volume: &self.volume,
        }
    }
}

/// Run the magnifier loop. Returns signal vectors on the magnifier
/// timeline (length `df_mag.len()`).
pub(crate) fn run_magnifier(
    strategy: &CompiledStrategy,
    df_tf: &OhlcvFrame,
    df_mag: &OhlcvFrame,
    timeframe: Timeframe,
    params: &HashMap<String, ParamValue>,
    backend: MagnifierBackend,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<SignalVectors, EngineError> {
    let warmup = strategy.warmup;
    let window_size = warmup * 3;
    let n_tf = df_tf.len();
    let n_mag = df_mag.len();
    let td = timeframe.duration();

    let mut signals = SignalVectors::all_false(n_mag);
    let mut in_long = false;
    let mut in_short = false;

    let total_bars = n_tf.saturating_sub(warmup);
    let report_interval = (total_bars / 50).max(1);
    let mut buf = WindowBuf::with_capacity(window_size + 1);

    for bar_idx in warmup..n_tf {
        let done = bar_idx - warmup;
        if done % report_interval == 0 {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let pct = 20 + (done as f64 / total_bars.max(1) as f64 * 68.0) as u8;
            progress.report(pct, &format!("magnifier: bar {done}/{total_bars}"));
        }

        // Sub-bar span covering [bar_start, bar_start + td)
        let bar_start = df_tf.timestamps[bar_idx];
        let bar_end = bar_start + td;
        let pos_start = df_mag.position_of(bar_start);
        let pos_end = df_mag.position_of(bar_end);
        if pos_start >= pos_end {
            continue;
        }

        let win_start = bar_idx.saturating_sub(window_size);
        buf.load_completed(df_tf, win_start, bar_idx);

        let forming_open = df_mag.open[pos_start];
        let mut forming_high = f64::NEG_INFINITY;
        let mut forming_low = f64::INFINITY;
        let mut forming_volume = 0.0;

        for pos in pos_start..pos_end {
            forming_high = forming_high.max(df_mag.high[pos]);
            forming_low = forming_low.min(df_mag.low[pos]);
            let forming_close = df_mag.close[pos];
            forming_volume += df_mag.volume[pos];
            buf.set_forming(
                forming_open,
                forming_high,
                forming_low,
                forming_close,
                forming_volume,
            );

            // A short window may not hold the history the strategy
            // references; a failed evaluation means no signal here.
            let fired = match backend {
                MagnifierBackend::Step => strategy.step(
                    &buf.open,
                    &buf.high,
                    &buf.low,
                    &buf.close,
                    &buf.volume,
                    params,
                ),
                MagnifierBackend::BatchOnWindow => strategy.batch(buf.view(), params).map(|s| {
                    (
                        s.long_entries.last().copied().unwrap_or(false),
                        s.long_exits.last().copied().unwrap_or(false),
                        s.short_entries.last().copied().unwrap_or(false),
                        s.short_exits.last().copied().unwrap_or(false),
                    )
                }),
            };
            let (le, lx, se, sx) = match fired {
                Ok(f) => f,
                Err(_) => continue,
            };

            // At most one transition per chart bar. Entries only from flat,
            // exits only from the matching side, in priority order.
            if !in_long && !in_short && le {
                signals.long_entries[pos] = true;
                in_long = true;
                break;
            }
            if in_long && lx {
                signals.long_exits[pos] = true;
                in_long = false;
                break;
            }
            if !in_long && !in_short && se {
                signals.short_entries[pos] = true;
                in_short = true;
                break;
            }
            if in_short && sx {
                signals.short_exits[pos] = true;
                in_short = false;
                break;
            }
        }
    }

    progress.report(88, "magnifier loop complete");
    Ok(signals)
}
