//! Signal-driven portfolio simulation.
//!
//! Consumes a close series and the four boolean signal vectors, applies
//! fills at bar close with slippage and proportional fees, and produces
//! the equity curve, per-bar returns, and trade/order/drawdown records.
//!
//! Entry signals reverse an open opposite position (close first, then
//! open), matching all-in signal portfolios. At most one transition is
//! applied per bar, in the order long-entry, long-exit, short-entry,
//! short-exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pinelab_core::pine::SignalVectors;

/// Position size per trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderSizing {
    /// All available cash.
    AllIn,
    /// Fraction of current equity in (0, 1].
    PercentOfEquity { fraction: f64 },
    /// Fixed quantity of the instrument.
    Fixed { quantity: f64 },
}

impl Default for OrderSizing {
    fn default() -> Self {
        OrderSizing::AllIn
    }
}

/// Cost and sizing model for a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSpec {
    pub initial_capital: f64,
    /// Per-fill fee as a fraction of notional.
    pub fees: f64,
    /// Price impact as a fraction of price, adverse on both sides.
    pub slippage: f64,
    pub sizing: OrderSizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

/// One round trip (or the final open position).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: usize,
    pub direction: TradeDirection,
    pub status: TradeStatus,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub size: f64,
    pub entry_fees: f64,
    pub exit_fees: f64,
    /// Realized for closed trades, mark-to-market for the open one.
    pub pnl: f64,
    pub return_pct: f64,
    pub bars_held: usize,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// One fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: usize,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    pub fees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawdownStatus {
    Recovered,
    Active,
}

/// One peak-to-recovery drawdown period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownRecord {
    pub drawdown_id: usize,
    pub peak_time: DateTime<Utc>,
    pub valley_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub peak_value: f64,
    pub valley_value: f64,
    pub end_value: Option<f64>,
    /// `valley/peak - 1`, in percent (negative).
    pub drawdown_pct: f64,
    pub status: DrawdownStatus,
}

/// Everything a simulation produces.
#[derive(Debug, Clone)]
pub struct PortfolioResult {
    pub equity: Vec<f64>,
    /// Per-bar fractional returns; 0.0 at index 0.
    pub returns: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    pub orders: Vec<OrderRecord>,
    pub drawdowns: Vec<DrawdownRecord>,
    pub final_value: f64,
    pub total_fees: f64,
}

struct OpenPosition {
    direction: TradeDirection,
    quantity: f64,
    entry_price: f64,
    entry_fees: f64,
    entry_index: usize,
}

/// Run the simulation over aligned series.
pub fn simulate(
    timestamps: &[DateTime<Utc>],
    close: &[f64],
    signals: &SignalVectors,
    spec: &PortfolioSpec,
) -> PortfolioResult {
    let n = close.len();
    let mut cash = spec.initial_capital;
    let mut position: Option<OpenPosition> = None;

    let mut equity = Vec::with_capacity(n);
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut orders: Vec<OrderRecord> = Vec::new();
    let mut total_fees = 0.0;

    for i in 0..n {
        let price = close[i];
        if !price.is_nan() {
            let in_long = matches!(&position, Some(p) if p.direction == TradeDirection::Long);
            let in_short = matches!(&position, Some(p) if p.direction == TradeDirection::Short);

            if signals.long_entries[i] && !in_long {
                if in_short {
                    close_position(
                        &mut position, &mut cash, &mut trades, &mut orders, &mut total_fees,
                        timestamps, price, spec, i,
                    );
                }
                open_position(
                    TradeDirection::Long, &mut position, &mut cash, &mut orders,
                    &mut total_fees, timestamps, price, spec, i,
                );
            } else if signals.long_exits[i] && in_long {
                close_position(
                    &mut position, &mut cash, &mut trades, &mut orders, &mut total_fees,
                    timestamps, price, spec, i,
                );
            } else if signals.short_entries[i] && !in_short {
                if in_long {
                    close_position(
                        &mut position, &mut cash, &mut trades, &mut orders, &mut total_fees,
                        timestamps, price, spec, i,
                    );
                }
                open_position(
                    TradeDirection::Short, &mut position, &mut cash, &mut orders,
                    &mut total_fees, timestamps, price, spec, i,
                );
            } else if signals.short_exits[i] && in_short {
                close_position(
                    &mut position, &mut cash, &mut trades, &mut orders, &mut total_fees,
                    timestamps, price, spec, i,
                );
            }
        }

        let marked = mark_equity(cash, &position, price, equity.last().copied());
        equity.push(marked);
    }

    // The final open position stays open, marked to the last close
    if let Some(pos) = position.take() {
        let last_price = close[n - 1];
        let mark = if last_price.is_nan() { pos.entry_price } else { last_price };
        let pnl = match pos.direction {
            TradeDirection::Long => pos.quantity * (mark - pos.entry_price) - pos.entry_fees,
            TradeDirection::Short => pos.quantity * (pos.entry_price - mark) - pos.entry_fees,
        };
        let notional = pos.quantity * pos.entry_price;
        trades.push(TradeRecord {
            trade_id: trades.len(),
            direction: pos.direction,
            status: TradeStatus::Open,
            entry_time: timestamps[pos.entry_index],
            exit_time: None,
            entry_price: pos.entry_price,
            exit_price: None,
            size: pos.quantity,
            entry_fees: pos.entry_fees,
            exit_fees: 0.0,
            pnl,
            return_pct: if notional > 0.0 { pnl / notional * 100.0 } else { 0.0 },
            bars_held: n - 1 - pos.entry_index,
        });
    }

    let returns = bar_returns(&equity);
    let drawdowns = extract_drawdowns(timestamps, &equity);
    let final_value = equity.last().copied().unwrap_or(spec.initial_capital);

    PortfolioResult {
        equity,
        returns,
        trades,
        orders,
        drawdowns,
        final_value,
        total_fees,
    }
}

#[allow(clippy::too_many_arguments)]
fn open_position(
    direction: TradeDirection,
    position: &mut Option<OpenPosition>,
    cash: &mut f64,
    orders: &mut Vec<OrderRecord>,
    total_fees: &mut f64,
    timestamps: &[DateTime<Utc>],
    price: f64,
    spec: &PortfolioSpec,
    index: usize,
) {
    let fill = match direction {
        TradeDirection::Long => price * (1.0 + spec.slippage),
        TradeDirection::Short => price * (1.0 - spec.slippage),
    };
    if fill <= 0.0 {
        return;
    }

    let equity = *cash; // flat at this point: equity is cash
    let budget = match spec.sizing {
        OrderSizing::AllIn => equity,
        OrderSizing::PercentOfEquity { fraction } => equity * fraction,
        OrderSizing::Fixed { quantity } => quantity * fill * (1.0 + spec.fees),
    };
    let quantity = match spec.sizing {
        OrderSizing::Fixed { quantity } => quantity.min(equity / (fill * (1.0 + spec.fees))),
        _ => budget / (fill * (1.0 + spec.fees)),
    };
    if quantity <= 0.0 {
        return;
    }

    let notional = quantity * fill;
    let fee = notional * spec.fees;
    *total_fees += fee;

    match direction {
        TradeDirection::Long => *cash -= notional + fee,
        TradeDirection::Short => *cash += notional - fee,
    }

    orders.push(OrderRecord {
        order_id: orders.len(),
        timestamp: timestamps[index],
        side: match direction {
            TradeDirection::Long => OrderSide::Buy,
            TradeDirection::Short => OrderSide::Sell,
        },
        price: fill,
        size: quantity,
        fees: fee,
    });

    *position = Some(OpenPosition {
        direction,
        quantity,
        entry_price: fill,
        entry_fees: fee,
        entry_index: index,
    });
}

#[allow(clippy::too_many_arguments)]
fn close_position(
    position: &mut Option<OpenPosition>,
    cash: &mut f64,
    trades: &mut Vec<TradeRecord>,
    orders: &mut Vec<OrderRecord>,
    total_fees: &mut f64,
    timestamps: &[DateTime<Utc>],
    price: f64,
    spec: &PortfolioSpec,
    index: usize,
) {
    let Some(pos) = position.take() else {
        return;
    };

    let fill = match pos.direction {
        TradeDirection::Long => price * (1.0 - spec.slippage),
        TradeDirection::Short => price * (1.0 + spec.slippage),
    };
    let notional = pos.quantity * fill;
    let fee = notional * spec.fees;
    *total_fees += fee;

    let pnl = match pos.direction {
        TradeDirection::Long => {
            *cash += notional - fee;
            pos.quantity * (fill - pos.entry_price) - pos.entry_fees - fee
        }
        TradeDirection::Short => {
            *cash -= notional + fee;
            pos.quantity * (pos.entry_price - fill) - pos.entry_fees - fee
        }
    };

    orders.push(OrderRecord {
        order_id: orders.len(),
        timestamp: timestamps[index],
        side: match pos.direction {
            TradeDirection::Long => OrderSide::Sell,
            TradeDirection::Short => OrderSide::Buy,
        },
        price: fill,
        size: pos.quantity,
        fees: fee,
    });

    let entry_notional = pos.quantity * pos.entry_price;
    trades.push(TradeRecord {
        trade_id: trades.len(),
        direction: pos.direction,
        status: TradeStatus::Closed,
        entry_time: timestamps[pos.entry_index],
        exit_time: Some(timestamps[index]),
        entry_price: pos.entry_price,
        exit_price: Some(fill),
        size: pos.quantity,
        entry_fees: pos.entry_fees,
        exit_fees: fee,
        pnl,
        return_pct: if entry_notional > 0.0 {
            pnl / entry_notional * 100.0
        } else {
            0.0
        },
        bars_held: index - pos.entry_index,
    });
}

fn mark_equity(cash: f64, position: &Option<OpenPosition>, price: f64, prev: Option<f64>) -> f64 {
    match position {
        None => cash,
        Some(pos) => {
            if price.is_nan() {
                // Carry the previous equity on void prices
                return prev.unwrap_or(cash);
            }
            match pos.direction {
                TradeDirection::Long => cash + pos.quantity * price,
                TradeDirection::Short => cash - pos.quantity * price,
            }
        }
    }
}

fn bar_returns(equity: &[f64]) -> Vec<f64> {
    let mut returns = vec![0.0; equity.len()];
    for i in 1..equity.len() {
        if equity[i - 1] > 0.0 {
            returns[i] = equity[i] / equity[i - 1] - 1.0;
        }
    }
    returns
}

/// Extract drawdown periods from the equity curve: each record spans the
/// peak through the valley to the bar equity recovers the peak.
fn extract_drawdowns(timestamps: &[DateTime<Utc>], equity: &[f64]) -> Vec<DrawdownRecord> {
    let mut records = Vec::new();
    if equity.is_empty() {
        return records;
    }

    let mut peak = equity[0];
    let mut peak_idx = 0;
    let mut valley = equity[0];
    let mut valley_idx = 0;
    let mut in_drawdown = false;

    for i in 1..equity.len() {
        let eq = equity[i];
        if eq >= peak {
            if in_drawdown {
                records.push(DrawdownRecord {
                    drawdown_id: records.len(),
                    peak_time: timestamps[peak_idx],
                    valley_time: timestamps[valley_idx],
                    end_time: Some(timestamps[i]),
                    peak_value: peak,
                    valley_value: valley,
                    end_value: Some(eq),
                    drawdown_pct: if peak > 0.0 { (valley / peak - 1.0) * 100.0 } else { 0.0 },
                    status: DrawdownStatus::Recovered,
                });
                in_drawdown = false;
            }
            peak = eq;
            peak_idx = i;
        } else {
            if !in_drawdown {
                in_drawdown = true;
                valley = eq;
                valley_idx = i;
            } else if eq < valley {
                valley = eq;
                valley_idx = i;
            }
        }
    }

    if in_drawdown {
        records.push(DrawdownRecord {
            drawdown_id: records.len(),
            peak_time: timestamps[peak_idx],
            valley_time: timestamps[valley_idx],
            end_time: None,
            peak_value: peak,
            valley_value: valley,
            end_value: None,
            drawdown_pct: if peak > 0.0 { (valley / peak - 1.0) * 100.0 } else { 0.0 },
            status: DrawdownStatus::Active,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamps(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| Utc.timestamp_opt(i as i64 * 3600, 0).unwrap())
            .collect()
    }

    fn spec() -> PortfolioSpec {
        PortfolioSpec {
            initial_capital: 10_000.0,
            fees: 0.0,
            slippage: 0.0,
            sizing: OrderSizing::AllIn,
        }
    }

    fn signals_with(n: usize, entries: &[usize], exits: &[usize]) -> SignalVectors {
        let mut signals = SignalVectors::all_false(n);
        for &i in entries {
            signals.long_entries[i] = true;
        }
        for &i in exits {
            signals.long_exits[i] = true;
        }
        signals
    }

    #[test]
    fn no_signals_constant_equity() {
        let close = vec![100.0; 10];
        let result = simulate(&stamps(10), &close, &SignalVectors::all_false(10), &spec());
        assert!(result.equity.iter().all(|e| *e == 10_000.0));
        assert!(result.trades.is_empty());
        assert!(result.orders.is_empty());
        assert!(result.drawdowns.is_empty());
    }

    #[test]
    fn long_round_trip_profits() {
        // Buy at 100, sell at 110: +10%
        let close = vec![100.0, 100.0, 105.0, 110.0, 110.0];
        let result = simulate(&stamps(5), &close, &signals_with(5, &[1], &[3]), &spec());
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.status, TradeStatus::Closed);
        assert!((trade.return_pct - 10.0).abs() < 1e-9);
        assert!((result.final_value - 11_000.0).abs() < 1e-6);
        assert_eq!(result.orders.len(), 2);
    }

    #[test]
    fn fees_reduce_final_value() {
        let close = vec![100.0, 100.0, 110.0, 110.0];
        let mut with_fees = spec();
        with_fees.fees = 0.001;
        let result = simulate(&stamps(4), &close, &signals_with(4, &[1], &[2]), &with_fees);
        assert!(result.final_value < 11_000.0);
        assert!(result.total_fees > 0.0);
        assert!((result.trades[0].entry_fees + result.trades[0].exit_fees - result.total_fees).abs() < 1e-9);
    }

    #[test]
    fn slippage_worsens_both_fills() {
        let close = vec![100.0, 100.0, 110.0, 110.0];
        let mut with_slip = spec();
        with_slip.slippage = 0.01;
        let result = simulate(&stamps(4), &close, &signals_with(4, &[1], &[2]), &with_slip);
        let trade = &result.trades[0];
        assert!(trade.entry_price > 100.0);
        assert!(trade.exit_price.unwrap() < 110.0);
    }

    #[test]
    fn short_round_trip_profits_on_decline() {
        let n = 5;
        let close = vec![100.0, 100.0, 95.0, 90.0, 90.0];
        let mut signals = SignalVectors::all_false(n);
        signals.short_entries[1] = true;
        signals.short_exits[3] = true;
        let result = simulate(&stamps(n), &close, &signals, &spec());
        let trade = &result.trades[0];
        assert_eq!(trade.direction, TradeDirection::Short);
        assert!(trade.pnl > 0.0);
        assert!((result.final_value - 11_000.0).abs() < 1e-6);
    }

    #[test]
    fn long_entry_reverses_short() {
        let n = 6;
        let close = vec![100.0, 100.0, 95.0, 95.0, 100.0, 100.0];
        let mut signals = SignalVectors::all_false(n);
        signals.short_entries[1] = true;
        signals.long_entries[3] = true;
        let result = simulate(&stamps(n), &close, &signals, &spec());
        // Short closed at bar 3, long open at end
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].direction, TradeDirection::Short);
        assert_eq!(result.trades[0].status, TradeStatus::Closed);
        assert_eq!(result.trades[1].direction, TradeDirection::Long);
        assert_eq!(result.trades[1].status, TradeStatus::Open);
    }

    #[test]
    fn percent_sizing_limits_exposure() {
        let close = vec![100.0, 100.0, 110.0, 110.0];
        let mut half = spec();
        half.sizing = OrderSizing::PercentOfEquity { fraction: 0.5 };
        let result = simulate(&stamps(4), &close, &signals_with(4, &[1], &[2]), &half);
        // Half the equity at +10%: final = 10000 * 1.05
        assert!((result.final_value - 10_500.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_sizing_uses_quantity() {
        let close = vec![100.0, 100.0, 110.0, 110.0];
        let mut fixed = spec();
        fixed.sizing = OrderSizing::Fixed { quantity: 10.0 };
        let result = simulate(&stamps(4), &close, &signals_with(4, &[1], &[2]), &fixed);
        assert!((result.trades[0].size - 10.0).abs() < 1e-9);
        assert!((result.final_value - 10_100.0).abs() < 1e-6);
    }

    #[test]
    fn open_trade_marked_to_market() {
        let close = vec![100.0, 100.0, 120.0];
        let result = simulate(&stamps(3), &close, &signals_with(3, &[1], &[]), &spec());
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].status, TradeStatus::Open);
        assert!((result.final_value - 12_000.0).abs() < 1e-6);
    }

    #[test]
    fn drawdown_recorded_and_recovered() {
        let n = 6;
        let close = vec![100.0, 100.0, 80.0, 90.0, 105.0, 105.0];
        let result = simulate(&stamps(n), &close, &signals_with(n, &[1], &[]), &spec());
        assert_eq!(result.drawdowns.len(), 1);
        let dd = &result.drawdowns[0];
        assert_eq!(dd.status, DrawdownStatus::Recovered);
        assert!((dd.drawdown_pct - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn active_drawdown_at_end() {
        let n = 4;
        let close = vec![100.0, 100.0, 90.0, 85.0];
        let result = simulate(&stamps(n), &close, &signals_with(n, &[1], &[]), &spec());
        assert_eq!(result.drawdowns.len(), 1);
        assert_eq!(result.drawdowns[0].status, DrawdownStatus::Active);
        assert!(result.drawdowns[0].end_time.is_none());
    }

    #[test]
    fn returns_align_with_equity() {
        let close = vec![100.0, 100.0, 110.0, 110.0];
        let result = simulate(&stamps(4), &close, &signals_with(4, &[1], &[2]), &spec());
        assert_eq!(result.returns.len(), 4);
        assert_eq!(result.returns[0], 0.0);
        assert!((result.returns[2] - 0.10).abs() < 1e-9);
    }
}
