//! Data layer: the bar-source contract, CSV ingest, the Parquet cache,
//! resampling, and seeded synthetic bars.

pub mod cache;
pub mod ingest;
pub mod resample;
pub mod source;
pub mod synthetic;

pub use cache::{CacheMeta, ParquetCache};
pub use ingest::{read_csv, CsvSource};
pub use resample::resample;
pub use source::{BarSource, DataError, InMemorySource};
pub use synthetic::synthetic_1m;
