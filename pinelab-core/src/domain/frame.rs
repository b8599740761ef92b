//! OhlcvFrame — the column-major bar table every stage operates on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A table of timestamped OHLCV rows with column-major storage.
///
/// Columns are plain `Vec<f64>` so kernels and the evaluator can borrow
/// them as contiguous slices. Timestamps are strictly increasing and, for
/// frames produced by resampling, uniformly spaced at the bar duration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OhlcvFrame {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl OhlcvFrame {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, ts: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        self.timestamps.push(ts);
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(volume);
    }

    /// Rows with timestamps in `[start, end]` (either bound optional).
    pub fn between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> OhlcvFrame {
        let lo = match start {
            Some(s) => self.timestamps.partition_point(|t| *t < s),
            None => 0,
        };
        let hi = match end {
            Some(e) => self.timestamps.partition_point(|t| *t <= e),
            None => self.len(),
        };
        self.slice(lo, hi.max(lo))
    }

    /// Copy out rows `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> OhlcvFrame {
        OhlcvFrame {
            timestamps: self.timestamps[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }

    /// Index of the first row with timestamp >= `ts`.
    pub fn position_of(&self, ts: DateTime<Utc>) -> usize {
        self.timestamps.partition_point(|t| *t < ts)
    }

    /// Timestamps strictly increasing and all columns the same length.
    pub fn is_well_formed(&self) -> bool {
        let n = self.len();
        if self.open.len() != n
            || self.high.len() != n
            || self.low.len() != n
            || self.close.len() != n
            || self.volume.len() != n
        {
            return false;
        }
        self.timestamps.windows(2).all(|w| w[0] < w[1])
    }

    /// BLAKE3 hash over the raw bar data, for result provenance.
    pub fn data_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for i in 0..self.len() {
            hasher.update(&self.timestamps[i].timestamp().to_le_bytes());
            hasher.update(&self.open[i].to_le_bytes());
            hasher.update(&self.high[i].to_le_bytes());
            hasher.update(&self.low[i].to_le_bytes());
            hasher.update(&self.close[i].to_le_bytes());
            hasher.update(&self.volume[i].to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
