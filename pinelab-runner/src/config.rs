//! Serializable run configuration for the CLI (TOML).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pinelab_core::domain::Timeframe;
use pinelab_core::engine::MagnifierBackend;
use pinelab_core::pine::ParamValue;

use crate::portfolio::OrderSizing;
use crate::runner::RunOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read failed: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A complete backtest run description, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Path to the strategy script.
    pub script: PathBuf,
    pub data: DataConfig,
    pub backtest: BacktestSection,
    /// Strategy input overrides.
    #[serde(default)]
    pub params: HashMap<String, ParamValue>,
}

/// Where the 1-minute bars come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataConfig {
    Csv { path: PathBuf },
    Parquet { dir: PathBuf },
    /// Seeded synthetic bars, for demos and smoke runs.
    Synthetic { bars: usize, seed: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestSection {
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    pub timeframe: Timeframe,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_magnify")]
    pub magnify: bool,
    pub initial_capital: Option<f64>,
    pub fees: Option<f64>,
    pub slippage: Option<f64>,
    #[serde(default)]
    pub sizing: OrderSizing,
}

fn default_exchange() -> String {
    "NYSE".to_string()
}

fn default_magnify() -> bool {
    true
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config: RunConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.backtest.start, self.backtest.end) {
            if start >= end {
                return Err(ConfigError::Invalid(format!(
                    "start {start} is not before end {end}"
                )));
            }
        }
        if let DataConfig::Synthetic { bars, .. } = &self.data {
            if *bars == 0 {
                return Err(ConfigError::Invalid("synthetic bars must be > 0".into()));
            }
        }
        Ok(())
    }

    /// Content-addressable id: identical configs share a run id.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn to_options(&self) -> RunOptions {
        RunOptions {
            symbol: self.backtest.symbol.clone(),
            exchange: self.backtest.exchange.clone(),
            start: self.backtest.start,
            end: self.backtest.end,
            timeframe: self.backtest.timeframe,
            magnify: self.backtest.magnify,
            backend: MagnifierBackend::default(),
            initial_capital: self.backtest.initial_capital,
            fees: self.backtest.fees,
            slippage: self.backtest.slippage,
            sizing: self.backtest.sizing,
            overrides: self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
script = "strategies/rsi.pine"

[data]
source = "synthetic"
bars = 5000
seed = 42

[backtest]
symbol = "BTCUSDT"
exchange = "BINANCE"
timeframe = "1h"
magnify = true
initial_capital = 25000.0

[backtest.sizing]
type = "percent_of_equity"
fraction = 0.5

[params]
rsiLength = 21
"#;

    #[test]
    fn parses_sample_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = RunConfig::load(file.path()).unwrap();

        assert_eq!(config.backtest.timeframe, Timeframe::H1);
        assert_eq!(config.backtest.exchange, "BINANCE");
        assert!(matches!(config.data, DataConfig::Synthetic { bars: 5000, seed: 42 }));
        assert_eq!(config.params["rsiLength"], ParamValue::Int(21));
        assert!(matches!(
            config.backtest.sizing,
            OrderSizing::PercentOfEquity { fraction } if fraction == 0.5
        ));
    }

    #[test]
    fn run_id_is_stable_and_content_addressed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let a = RunConfig::load(file.path()).unwrap();
        let b = RunConfig::load(file.path()).unwrap();
        assert_eq!(a.run_id(), b.run_id());

        let mut c = a.clone();
        c.backtest.symbol = "ETHUSDT".to_string();
        assert_ne!(a.run_id(), c.run_id());
    }

    #[test]
    fn invalid_date_range_rejected() {
        let bad = SAMPLE.replace(
            "magnify = true",
            "magnify = true\nstart = \"2024-02-01T00:00:00Z\"\nend = \"2024-01-01T00:00:00Z\"",
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bad.as_bytes()).unwrap();
        assert!(matches!(
            RunConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
