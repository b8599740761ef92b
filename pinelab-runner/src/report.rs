//! Result-envelope assembly: the serialized output callers consume.
//!
//! Time series are sampled down to charting budgets (equity/returns/
//! drawdown to 1000 points, chart candles to 5000 bars); trade markers
//! are built from trade records and snapped to the chart-timeframe
//! candle that contains them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pinelab_core::domain::{OhlcvFrame, Timeframe};
use pinelab_core::engine::{EngineOutput, RunMode};
use pinelab_core::pine::{CompiledStrategy, ParamValue};

use crate::metrics::PerformanceMetrics;
use crate::portfolio::{
    DrawdownRecord, OrderRecord, OrderSide, PortfolioResult, TradeDirection, TradeRecord,
};

/// Schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum sampled points for equity/returns/drawdown curves.
const MAX_CURVE_POINTS: usize = 1000;

/// Maximum OHLCV bars included for candlestick charting.
const MAX_CHART_BARS: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub r#return: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub timestamp: DateTime<Utc>,
    pub drawdown_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Entry/exit marker for chart overlay, snapped to a chart candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMarker {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub side: OrderSide,
    pub direction: TradeDirection,
    pub is_entry: bool,
    pub trade_id: usize,
    pub pnl: Option<f64>,
}

/// The complete serialized result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    // Metadata
    pub strategy_name: String,
    pub symbol: String,
    pub exchange: String,
    pub timeframe: Timeframe,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub mode: RunMode,
    pub params: HashMap<String, ParamValue>,
    pub initial_capital: f64,
    /// BLAKE3 over the chart bars the run consumed.
    pub dataset_hash: String,

    // Statistics
    pub metrics: PerformanceMetrics,

    // Sampled time series
    pub equity_curve: Vec<EquityPoint>,
    pub returns: Vec<ReturnPoint>,
    pub drawdown_curve: Vec<DrawdownPoint>,
    pub ohlcv_bars: Vec<ChartBar>,
    pub trade_markers: Vec<TradeMarker>,

    // Full records
    pub trades: Vec<TradeRecord>,
    pub orders: Vec<OrderRecord>,
    pub drawdowns: Vec<DrawdownRecord>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Build the report from the engine output and portfolio result.
pub fn assemble_report(
    strategy: &CompiledStrategy,
    symbol: &str,
    exchange: &str,
    timeframe: Timeframe,
    initial_capital: f64,
    engine: &EngineOutput,
    portfolio: PortfolioResult,
) -> BacktestReport {
    let metrics = PerformanceMetrics::compute(
        &portfolio.equity,
        &portfolio.returns,
        &portfolio.trades,
        &engine.signal_close,
        portfolio.total_fees,
        engine.signal_timeframe,
    );

    let ts = &engine.signal_timestamps;
    let step = (ts.len() / MAX_CURVE_POINTS).max(1);

    let equity_curve = sample(ts, &portfolio.equity, step, |timestamp, value| EquityPoint {
        timestamp,
        value,
    });
    let returns = sample(ts, &portfolio.returns, step, |timestamp, r| ReturnPoint {
        timestamp,
        r#return: r,
    });
    let underwater = underwater_curve(&portfolio.equity);
    let drawdown_curve = sample(ts, &underwater, step, |timestamp, dd| DrawdownPoint {
        timestamp,
        drawdown_pct: dd * 100.0,
    });

    let ohlcv_bars = chart_bars(&engine.chart);
    let trade_markers = build_trade_markers(&portfolio.trades, &engine.chart.timestamps);

    BacktestReport {
        schema_version: SCHEMA_VERSION,
        strategy_name: strategy.name.clone(),
        symbol: symbol.to_string(),
        exchange: exchange.to_string(),
        timeframe,
        start_date: *ts.first().expect("non-empty run"),
        end_date: *ts.last().expect("non-empty run"),
        mode: engine.mode,
        params: engine.params.clone(),
        initial_capital,
        dataset_hash: engine.chart.data_hash(),
        metrics,
        equity_curve,
        returns,
        drawdown_curve,
        ohlcv_bars,
        trade_markers,
        trades: portfolio.trades,
        orders: portfolio.orders,
        drawdowns: portfolio.drawdowns,
    }
}

fn sample<T>(
    timestamps: &[DateTime<Utc>],
    values: &[f64],
    step: usize,
    make: impl Fn(DateTime<Utc>, f64) -> T,
) -> Vec<T> {
    timestamps
        .iter()
        .zip(values)
        .step_by(step)
        .map(|(ts, v)| make(*ts, *v))
        .collect()
}

/// Fractional drawdown below the running peak, per bar.
fn underwater_curve(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&eq| {
            if eq > peak {
                peak = eq;
            }
            if peak > 0.0 {
                (eq - peak) / peak
            } else {
                0.0
            }
        })
        .collect()
}

fn chart_bars(chart: &OhlcvFrame) -> Vec<ChartBar> {
    let step = (chart.len() / MAX_CHART_BARS).max(1);
    (0..chart.len())
        .step_by(step)
        .map(|i| ChartBar {
            timestamp: chart.timestamps[i],
            open: chart.open[i],
            high: chart.high[i],
            low: chart.low[i],
            close: chart.close[i],
            volume: chart.volume[i],
        })
        .collect()
}

/// One entry marker per trade and one exit marker per closed trade.
/// Marker timestamps snap to the chart candle containing the fill.
fn build_trade_markers(
    trades: &[TradeRecord],
    chart_timestamps: &[DateTime<Utc>],
) -> Vec<TradeMarker> {
    if chart_timestamps.is_empty() {
        return Vec::new();
    }

    let snap = |ts: DateTime<Utc>| -> DateTime<Utc> {
        let idx = chart_timestamps.partition_point(|t| *t <= ts);
        let idx = idx.saturating_sub(1).min(chart_timestamps.len() - 1);
        chart_timestamps[idx]
    };

    let mut markers = Vec::with_capacity(trades.len() * 2);
    for trade in trades {
        let is_long = trade.direction == TradeDirection::Long;
        markers.push(TradeMarker {
            timestamp: snap(trade.entry_time),
            price: trade.entry_price,
            side: if is_long { OrderSide::Buy } else { OrderSide::Sell },
            direction: trade.direction,
            is_entry: true,
            trade_id: trade.trade_id,
            pnl: None,
        });
        if let (Some(exit_time), Some(exit_price)) = (trade.exit_time, trade.exit_price) {
            markers.push(TradeMarker {
                timestamp: snap(exit_time),
                price: exit_price,
                side: if is_long { OrderSide::Sell } else { OrderSide::Buy },
                direction: trade.direction,
                is_entry: false,
                trade_id: trade.trade_id,
                pnl: Some(trade.pnl),
            });
        }
    }
    markers
}
