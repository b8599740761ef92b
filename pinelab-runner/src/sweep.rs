//! Parameter sweep: run one strategy over a grid of input overrides.
//!
//! Each grid point is an independent backtest on its own rayon worker;
//! the only shared state is the read-only 1m frame and the compiled
//! strategy. Engine failures for individual points are carried in the
//! row rather than aborting the sweep.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pinelab_core::domain::OhlcvFrame;
use pinelab_core::engine::{CancelToken, NoProgress};
use pinelab_core::pine::{CompiledStrategy, ParamValue};

use crate::runner::{run_backtest_on_frames, RunError, RunOptions};

/// One dimension of the sweep grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Summary of one grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub params: HashMap<String, ParamValue>,
    pub total_return_pct: f64,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    /// Present when this grid point failed to run.
    pub error: Option<String>,
}

/// Run the full cartesian product of the axes. Rows come back in grid
/// order (last axis fastest). Cancellation aborts the whole sweep.
pub fn run_sweep(
    df_1m: &OhlcvFrame,
    strategy: &CompiledStrategy,
    base: &RunOptions,
    axes: &[SweepAxis],
    cancel: &CancelToken,
) -> Result<Vec<SweepRow>, RunError> {
    let grid = cartesian(axes);

    let rows: Vec<SweepRow> = grid
        .par_iter()
        .map(|point| {
            if cancel.is_cancelled() {
                return SweepRow {
                    params: point.clone(),
                    total_return_pct: 0.0,
                    sharpe_ratio: None,
                    max_drawdown_pct: 0.0,
                    total_trades: 0,
                    error: Some("cancelled".to_string()),
                };
            }

            let mut options = base.clone();
            options.overrides.extend(point.clone());

            match run_backtest_on_frames(df_1m, strategy, &options, &NoProgress, cancel) {
                Ok(report) => SweepRow {
                    params: point.clone(),
                    total_return_pct: report.metrics.total_return_pct,
                    sharpe_ratio: report.metrics.sharpe_ratio,
                    max_drawdown_pct: report.metrics.max_drawdown_pct,
                    total_trades: report.metrics.total_trades,
                    error: None,
                },
                Err(err) => SweepRow {
                    params: point.clone(),
                    total_return_pct: 0.0,
                    sharpe_ratio: None,
                    max_drawdown_pct: 0.0,
                    total_trades: 0,
                    error: Some(err.to_string()),
                },
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }
    Ok(rows)
}

/// Cartesian product of the axes, last axis varying fastest.
fn cartesian(axes: &[SweepAxis]) -> Vec<HashMap<String, ParamValue>> {
    let mut grid: Vec<HashMap<String, ParamValue>> = vec![HashMap::new()];
    for axis in axes {
        let mut next = Vec::with_capacity(grid.len() * axis.values.len());
        for point in &grid {
            for value in &axis.values {
                let mut extended = point.clone();
                extended.insert(axis.name.clone(), value.clone());
                next.push(extended);
            }
        }
        grid = next;
    }
    grid
}
