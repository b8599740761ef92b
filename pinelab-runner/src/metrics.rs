//! Performance metrics — pure functions over the equity curve, per-bar
//! returns and trade list. No dependencies on the runner or engine.
//!
//! Annualization scales by bars-per-year derived from the bar timeframe
//! (525 960 minutes per year, markets assumed continuous).

use serde::{Deserialize, Serialize};

use pinelab_core::domain::Timeframe;

use crate::portfolio::{TradeRecord, TradeStatus};

/// Minutes in a mean year (365.25 days).
const MINUTES_PER_YEAR: f64 = 525_960.0;

/// Bars per year for a given bar duration.
pub fn bars_per_year(timeframe: Timeframe) -> f64 {
    MINUTES_PER_YEAR / f64::from(timeframe.minutes())
}

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub final_value: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: Option<f64>,
    pub annualized_volatility_pct: Option<f64>,
    /// Buy-and-hold return of the traded series over the same span.
    pub benchmark_return_pct: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub omega_ratio: Option<f64>,
    pub max_drawdown_pct: f64,
    pub max_drawdown_bars: usize,
    pub total_trades: usize,
    pub total_closed_trades: usize,
    pub total_open_trades: usize,
    pub open_trade_pnl: f64,
    pub win_rate_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    pub avg_winning_trade_pct: f64,
    pub avg_losing_trade_pct: f64,
    /// None when there are no losses (infinite factor).
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    pub total_fees_paid: f64,
}

impl PerformanceMetrics {
    pub fn compute(
        equity: &[f64],
        returns: &[f64],
        trades: &[TradeRecord],
        close: &[f64],
        total_fees: f64,
        timeframe: Timeframe,
    ) -> Self {
        let per_year = bars_per_year(timeframe);
        let closed: Vec<&TradeRecord> = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed)
            .collect();
        let open: Vec<&TradeRecord> = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Open)
            .collect();

        let (dd_pct, dd_bars) = max_drawdown(equity);

        Self {
            final_value: equity.last().copied().unwrap_or(0.0),
            total_return_pct: total_return(equity) * 100.0,
            annualized_return_pct: annualized_return(equity, per_year).map(|v| v * 100.0),
            annualized_volatility_pct: annualized_volatility(returns, per_year).map(|v| v * 100.0),
            benchmark_return_pct: total_return(close) * 100.0,
            sharpe_ratio: sharpe(returns, per_year),
            sortino_ratio: sortino(returns, per_year),
            calmar_ratio: calmar(equity, per_year),
            omega_ratio: omega(returns),
            max_drawdown_pct: dd_pct * 100.0,
            max_drawdown_bars: dd_bars,
            total_trades: trades.len(),
            total_closed_trades: closed.len(),
            total_open_trades: open.len(),
            open_trade_pnl: open.iter().map(|t| t.pnl).sum(),
            win_rate_pct: win_rate(&closed) * 100.0,
            // 0.0 only when there are no closed trades at all
            best_trade_pct: closed
                .iter()
                .map(|t| t.return_pct)
                .reduce(f64::max)
                .unwrap_or(0.0),
            worst_trade_pct: closed
                .iter()
                .map(|t| t.return_pct)
                .reduce(f64::min)
                .unwrap_or(0.0),
            avg_winning_trade_pct: avg_return(&closed, true),
            avg_losing_trade_pct: avg_return(&closed, false),
            profit_factor: profit_factor(&closed),
            expectancy: expectancy(&closed),
            total_fees_paid: total_fees,
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let initial = series[0];
    let final_v = *series.last().unwrap();
    if initial <= 0.0 || initial.is_nan() || final_v.is_nan() {
        return 0.0;
    }
    (final_v - initial) / initial
}

/// Compound annual growth from the equity curve span.
pub fn annualized_return(equity: &[f64], per_year: f64) -> Option<f64> {
    if equity.len() < 2 {
        return None;
    }
    let initial = equity[0];
    let final_v = *equity.last().unwrap();
    if initial <= 0.0 || final_v <= 0.0 {
        return None;
    }
    let years = (equity.len() - 1) as f64 / per_year;
    if years <= 0.0 {
        return None;
    }
    Some((final_v / initial).powf(1.0 / years) - 1.0)
}

/// Annualized standard deviation of per-bar returns.
pub fn annualized_volatility(returns: &[f64], per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(returns) * per_year.sqrt())
}

/// Annualized Sharpe ratio at zero risk-free rate.
/// None when the return variance is zero.
pub fn sharpe(returns: &[f64], per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = mean(returns);
    let std = std_dev(returns);
    if std < 1e-15 {
        return None;
    }
    Some(mean / std * per_year.sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino(returns: &[f64], per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean_r = mean(returns);
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return None;
    }
    Some(mean_r / downside_std * per_year.sqrt())
}

/// Calmar ratio: annualized return over absolute max drawdown.
pub fn calmar(equity: &[f64], per_year: f64) -> Option<f64> {
    let annual = annualized_return(equity, per_year)?;
    let (dd, _) = max_drawdown(equity);
    if dd >= 0.0 {
        return None;
    }
    Some(annual / dd.abs())
}

/// Omega ratio at a zero threshold: gains over losses of per-bar returns.
pub fn omega(returns: &[f64]) -> Option<f64> {
    let gains: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| -r).sum();
    if losses < 1e-15 {
        return None;
    }
    Some(gains / losses)
}

/// Maximum drawdown as a negative fraction, plus its length in bars
/// (peak to valley).
pub fn max_drawdown(equity: &[f64]) -> (f64, usize) {
    if equity.len() < 2 {
        return (0.0, 0);
    }
    let mut peak = equity[0];
    let mut peak_idx = 0usize;
    let mut max_dd = 0.0f64;
    let mut max_dd_bars = 0usize;

    for (i, &eq) in equity.iter().enumerate() {
        if eq > peak {
            peak = eq;
            peak_idx = i;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
                max_dd_bars = i - peak_idx;
            }
        }
    }
    (max_dd, max_dd_bars)
}

fn win_rate(closed: &[&TradeRecord]) -> f64 {
    if closed.is_empty() {
        return 0.0;
    }
    closed.iter().filter(|t| t.is_winner()).count() as f64 / closed.len() as f64
}

fn avg_return(closed: &[&TradeRecord], winners: bool) -> f64 {
    let selected: Vec<f64> = closed
        .iter()
        .filter(|t| t.is_winner() == winners)
        .map(|t| t.return_pct)
        .collect();
    if selected.is_empty() {
        return 0.0;
    }
    selected.iter().sum::<f64>() / selected.len() as f64
}

/// Gross profits over gross losses; None when there are no losses.
fn profit_factor(closed: &[&TradeRecord]) -> Option<f64> {
    let profits: f64 = closed.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let losses: f64 = closed.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
    if losses < 1e-15 {
        return None;
    }
    Some(profits / losses)
}

/// Mean pnl per closed trade.
fn expectancy(closed: &[&TradeRecord]) -> f64 {
    if closed.is_empty() {
        return 0.0;
    }
    closed.iter().map(|t| t.pnl).sum::<f64>() / closed.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator).
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
