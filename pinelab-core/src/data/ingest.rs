//! CSV ingest: 1-minute bars from disk into an `OhlcvFrame`.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 or integer epoch seconds, UTC. Rows must be sorted ascending;
//! duplicates and disorder are rejected rather than silently fixed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::OhlcvFrame;

use super::source::{BarSource, DataError};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Read a bar CSV into a frame.
pub fn read_csv(path: &Path) -> Result<OhlcvFrame, DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Io(format!("{}: {e}", path.display())))?;

    let mut frame = OhlcvFrame::default();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| DataError::Format(format!("row {}: {e}", i + 2)))?;
        let ts = parse_timestamp(&row.timestamp)
            .ok_or_else(|| DataError::Format(format!("row {}: bad timestamp {:?}", i + 2, row.timestamp)))?;
        frame.push(ts, row.open, row.high, row.low, row.close, row.volume);
    }

    if !frame.is_well_formed() {
        return Err(DataError::Format(format!(
            "{}: timestamps not strictly increasing",
            path.display()
        )));
    }
    Ok(frame)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Utc.timestamp_opt(epoch, 0).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Bar source backed by a single CSV file, loaded lazily per request.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BarSource for CsvSource {
    fn load_1m(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<OhlcvFrame, DataError> {
        let frame = read_csv(&self.path)?;
        let cut = frame.between(start, end);
        if cut.is_empty() {
            return Err(DataError::empty(symbol, exchange, start, end));
        }
        Ok(cut)
    }
}
