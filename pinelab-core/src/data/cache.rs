//! Local Parquet bar cache.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/bars.parquet` with a `meta.json`
//! sidecar carrying the date range, row count and a BLAKE3 data hash.
//! Writes are atomic (write to `.tmp`, rename into place).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::OhlcvFrame;

use super::source::{BarSource, DataError};

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub exchange: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bar_count: usize,
    pub data_hash: String,
}

/// Parquet-backed 1-minute bar store.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("bars.parquet")
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Write a symbol's bars, replacing any previous cache entry.
    pub fn write(&self, symbol: &str, exchange: &str, frame: &OhlcvFrame) -> Result<(), DataError> {
        if frame.is_empty() {
            return Err(DataError::Cache("refusing to cache an empty frame".into()));
        }

        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir).map_err(|e| DataError::Cache(format!("create dir: {e}")))?;

        let df = frame_to_dataframe(frame)?;
        let path = self.bars_path(symbol);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            start: frame.timestamps[0],
            end: *frame.timestamps.last().unwrap(),
            bar_count: frame.len(),
            data_hash: frame.data_hash(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::Cache(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load all cached bars for a symbol.
    pub fn load(&self, symbol: &str) -> Result<OhlcvFrame, DataError> {
        let path = self.bars_path(symbol);
        if !path.exists() {
            return Err(DataError::Cache(format!("no cached data for '{symbol}'")));
        }
        let file =
            fs::File::open(&path).map_err(|e| DataError::Cache(format!("open: {e}")))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| DataError::Cache(format!("read parquet: {e}")))?;
        dataframe_to_frame(&df)
    }

    /// Cached metadata for a symbol, when present and readable.
    pub fn meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

impl BarSource for ParquetCache {
    fn load_1m(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<OhlcvFrame, DataError> {
        let frame = self.load(symbol)?;
        let cut = frame.between(start, end);
        if cut.is_empty() {
            return Err(DataError::empty(symbol, exchange, start, end));
        }
        Ok(cut)
    }
}

fn frame_to_dataframe(frame: &OhlcvFrame) -> Result<DataFrame, DataError> {
    let ts: Vec<i64> = frame.timestamps.iter().map(|t| t.timestamp()).collect();
    DataFrame::new(vec![
        Column::new("ts".into(), ts),
        Column::new("open".into(), frame.open.clone()),
        Column::new("high".into(), frame.high.clone()),
        Column::new("low".into(), frame.low.clone()),
        Column::new("close".into(), frame.close.clone()),
        Column::new("volume".into(), frame.volume.clone()),
    ])
    .map_err(|e| DataError::Cache(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::Cache(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Cache(format!("write parquet: {e}")))?;
    Ok(())
}

fn dataframe_to_frame(df: &DataFrame) -> Result<OhlcvFrame, DataError> {
    let col_err = |e: PolarsError| DataError::Cache(format!("column read: {e}"));
    let type_err = |e: PolarsError| DataError::Cache(format!("column type: {e}"));

    let ts = df.column("ts").map_err(col_err)?.i64().map_err(type_err)?;
    let open = df.column("open").map_err(col_err)?.f64().map_err(type_err)?;
    let high = df.column("high").map_err(col_err)?.f64().map_err(type_err)?;
    let low = df.column("low").map_err(col_err)?.f64().map_err(type_err)?;
    let close = df.column("close").map_err(col_err)?.f64().map_err(type_err)?;
    let volume = df.column("volume").map_err(col_err)?.f64().map_err(type_err)?;

    let n = df.height();
    let mut frame = OhlcvFrame::with_capacity(n);
    for i in 0..n {
        let (Some(t), Some(o), Some(h), Some(l), Some(c), Some(v)) = (
            ts.get(i),
            open.get(i),
            high.get(i),
            low.get(i),
            close.get(i),
            volume.get(i),
        ) else {
            return Err(DataError::Cache(format!("null value at row {i}")));
        };
        let ts = Utc
            .timestamp_opt(t, 0)
            .single()
            .ok_or_else(|| DataError::Cache(format!("bad timestamp {t} at row {i}")))?;
        frame.push(ts, o, h, l, c, v);
    }

    if !frame.is_well_formed() {
        return Err(DataError::Cache("cached bars not strictly increasing".into()));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::synthetic_1m;
    use chrono::TimeZone;

    #[test]
    fn roundtrip_preserves_bars() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let frame = synthetic_1m(100, 11, Utc.timestamp_opt(0, 0).unwrap());

        cache.write("BTCUSDT", "BINANCE", &frame).unwrap();
        let loaded = cache.load("BTCUSDT").unwrap();

        assert_eq!(loaded.len(), frame.len());
        assert_eq!(loaded.timestamps, frame.timestamps);
        assert_eq!(loaded.close, frame.close);
        assert_eq!(loaded.data_hash(), frame.data_hash());
    }

    #[test]
    fn meta_sidecar_written() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let frame = synthetic_1m(50, 3, Utc.timestamp_opt(0, 0).unwrap());
        cache.write("SPY", "NYSE", &frame).unwrap();

        let meta = cache.meta("SPY").unwrap();
        assert_eq!(meta.bar_count, 50);
        assert_eq!(meta.exchange, "NYSE");
        assert_eq!(meta.data_hash, frame.data_hash());
    }

    #[test]
    fn missing_symbol_is_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(cache.load("NOPE"), Err(DataError::Cache(_))));
    }

    #[test]
    fn source_respects_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let frame = synthetic_1m(100, 5, Utc.timestamp_opt(0, 0).unwrap());
        cache.write("SPY", "NYSE", &frame).unwrap();

        let start = Utc.timestamp_opt(50 * 60, 0).unwrap();
        let cut = cache.load_1m("SPY", "NYSE", Some(start), None).unwrap();
        assert_eq!(cut.len(), 50);
    }

    #[test]
    fn empty_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(cache.write("SPY", "NYSE", &OhlcvFrame::default()).is_err());
    }
}
