//! The bar-source contract and the in-memory implementation.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{OhlcvFrame, TimeframeError};

#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("no bars in [{start}..{end}] for {symbol} on {exchange}")]
    Empty {
        symbol: String,
        exchange: String,
        start: String,
        end: String,
    },
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed bar data: {0}")]
    Format(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error(transparent)]
    Timeframe(#[from] TimeframeError),
}

impl DataError {
    pub(crate) fn empty(
        symbol: &str,
        exchange: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        DataError::Empty {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            start: start.map_or_else(|| "earliest".to_string(), |t| t.to_rfc3339()),
            end: end.map_or_else(|| "latest".to_string(), |t| t.to_rfc3339()),
        }
    }
}

/// OHLCV provider: strict 1-minute spacing, UTC timestamps, ascending.
/// An empty result is an error, never an empty frame.
pub trait BarSource {
    fn load_1m(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<OhlcvFrame, DataError>;
}

/// A source backed by one pre-loaded frame. Serves any symbol; used by
/// tests and by parameter sweeps that reuse a single dataset.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    frame: OhlcvFrame,
}

impl InMemorySource {
    pub fn new(frame: OhlcvFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &OhlcvFrame {
        &self.frame
    }
}

impl BarSource for InMemorySource {
    fn load_1m(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<OhlcvFrame, DataError> {
        let cut = self.frame.between(start, end);
        if cut.is_empty() {
            return Err(DataError::empty(symbol, exchange, start, end));
        }
        Ok(cut)
    }
}
