//! Pinelab Core — strategy-script compiler, indicator kernels, and the
//! backtest engine.
//!
//! The crate follows the data flow end to end:
//! - `pine`: tokenizer, parser, lowering, and the evaluator behind the
//!   compiled strategy's `batch`/`step` routines
//! - `ta`: deterministic indicator kernels over contiguous f64 slices
//! - `engine`: standard and windowed-recompute magnifier execution with
//!   progress reporting and cancellation
//! - `data`: bar-source contract, CSV ingest, Parquet cache, resampling
//! - `domain`: OHLCV frame and timeframe types

pub mod data;
pub mod domain;
pub mod engine;
pub mod pine;
pub mod ta;
