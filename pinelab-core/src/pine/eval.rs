//! Evaluator for the lowered program.
//!
//! Both strategy routines run the same straight-line step list over the
//! bound table; `batch` returns the four whole boolean vectors and `step`
//! reads the last position of the same evaluation. Boolean series are
//! 0.0/1.0 series; NaN is falsy everywhere (comparisons against NaN are
//! false, NaN coerces to false in signal output).

use std::borrow::Cow;
use std::collections::HashMap;

use thiserror::Error;

use super::ast::{BinOpKind, UnaryOpKind};
use super::lower::{Kernel, LowExpr, Math1, Math2, PriceSeries};
use super::strategy::{CompiledStrategy, ParamValue, SignalVectors};
use crate::ta;

/// Borrowed view of the five OHLCV columns.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub open: &'a [f64],
    pub high: &'a [f64],
    pub low: &'a [f64],
    pub close: &'a [f64],
    pub volume: &'a [f64],
}

impl<'a> TableView<'a> {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

impl<'a> From<&'a crate::domain::OhlcvFrame> for TableView<'a> {
    fn from(frame: &'a crate::domain::OhlcvFrame) -> Self {
        TableView {
            open: &frame.open,
            high: &frame.high,
            low: &frame.low,
            close: &frame.close,
            volume: &frame.volume,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("'{kernel}' period must be a positive finite number, got {value}")]
    BadPeriod { kernel: &'static str, value: f64 },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("tuple index {index} out of range for {len} outputs")]
    TupleIndex { index: usize, len: usize },
}

/// A value flowing through evaluation.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Series(Vec<f64>),
    Scalar(f64),
    Str(String),
    Tuple(Vec<Value>),
}

impl CompiledStrategy {
    /// Run the whole-series routine: four boolean vectors aligned to the
    /// table, NaN coerced to false, unbound slots all-false.
    pub fn batch(
        &self,
        table: TableView<'_>,
        params: &HashMap<String, ParamValue>,
    ) -> Result<SignalVectors, EvalError> {
        let env = self.evaluate(table, params)?;
        let n = table.len();
        Ok(SignalVectors {
            long_entries: slot_bools(&env, self.slots.long_entries.as_deref(), n)?,
            long_exits: slot_bools(&env, self.slots.long_exits.as_deref(), n)?,
            short_entries: slot_bools(&env, self.slots.short_entries.as_deref(), n)?,
            short_exits: slot_bools(&env, self.slots.short_exits.as_deref(), n)?,
        })
    }

    /// Run the last-bar routine over raw arrays: the four booleans at the
    /// final position. Behaviorally identical to reading the last element
    /// of each `batch` vector, by construction.
    pub fn step(
        &self,
        open: &[f64],
        high: &[f64],
        low: &[f64],
        close: &[f64],
        volume: &[f64],
        params: &HashMap<String, ParamValue>,
    ) -> Result<(bool, bool, bool, bool), EvalError> {
        let table = TableView {
            open,
            high,
            low,
            close,
            volume,
        };
        let env = self.evaluate(table, params)?;
        let n = table.len();
        Ok((
            slot_last(&env, self.slots.long_entries.as_deref(), n)?,
            slot_last(&env, self.slots.long_exits.as_deref(), n)?,
            slot_last(&env, self.slots.short_entries.as_deref(), n)?,
            slot_last(&env, self.slots.short_exits.as_deref(), n)?,
        ))
    }

    fn evaluate(
        &self,
        table: TableView<'_>,
        params: &HashMap<String, ParamValue>,
    ) -> Result<HashMap<String, Value>, EvalError> {
        let mut env: HashMap<String, Value> = HashMap::new();

        // Bind inputs: schema defaults overridden by the resolved params.
        for (name, schema) in &self.input_schema {
            let value = params
                .get(name)
                .cloned()
                .unwrap_or_else(|| schema.default_value());
            env.insert(name.clone(), param_to_value(&value, table));
        }

        let mut eval = Evaluator { table, env };
        for step in &self.steps {
            let value = eval.eval(&step.expr)?;
            if step.targets.len() == 1 {
                eval.env.insert(step.targets[0].clone(), value);
            } else {
                // Tuple destructuring: each target takes its component
                let parts = match value {
                    Value::Tuple(parts) => parts,
                    other => vec![other],
                };
                for (i, target) in step.targets.iter().enumerate() {
                    let part = parts.get(i).cloned().unwrap_or(Value::Scalar(f64::NAN));
                    eval.env.insert(target.clone(), part);
                }
            }
        }
        Ok(eval.env)
    }
}

/// A `source`-typed input naming a price builtin binds that series; any
/// other parameter binds its scalar/string value.
fn param_to_value(param: &ParamValue, table: TableView<'_>) -> Value {
    match param {
        ParamValue::Int(v) => Value::Scalar(*v as f64),
        ParamValue::Float(v) => Value::Scalar(*v),
        ParamValue::Bool(b) => Value::Scalar(if *b { 1.0 } else { 0.0 }),
        ParamValue::Str(s) => match PriceSeries::from_name(s) {
            Some(price) => Value::Series(price_series(price, table)),
            None => Value::Str(s.clone()),
        },
    }
}

fn price_series(price: PriceSeries, table: TableView<'_>) -> Vec<f64> {
    let n = table.len();
    match price {
        PriceSeries::Open => table.open.to_vec(),
        PriceSeries::High => table.high.to_vec(),
        PriceSeries::Low => table.low.to_vec(),
        PriceSeries::Close => table.close.to_vec(),
        PriceSeries::Volume => table.volume.to_vec(),
        PriceSeries::Hl2 => (0..n).map(|i| (table.high[i] + table.low[i]) / 2.0).collect(),
        PriceSeries::Hlc3 => (0..n)
            .map(|i| (table.high[i] + table.low[i] + table.close[i]) / 3.0)
            .collect(),
        PriceSeries::Hlcc4 => (0..n)
            .map(|i| (table.high[i] + table.low[i] + 2.0 * table.close[i]) / 4.0)
            .collect(),
        PriceSeries::Ohlc4 => (0..n)
            .map(|i| (table.open[i] + table.high[i] + table.low[i] + table.close[i]) / 4.0)
            .collect(),
    }
}

fn slot_value<'e>(
    env: &'e HashMap<String, Value>,
    name: Option<&str>,
) -> Result<Option<&'e Value>, EvalError> {
    match name {
        None => Ok(None),
        Some(name) => env
            .get(name)
            .map(Some)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string())),
    }
}

fn slot_bools(
    env: &HashMap<String, Value>,
    name: Option<&str>,
    n: usize,
) -> Result<Vec<bool>, EvalError> {
    Ok(match slot_value(env, name)? {
        None => vec![false; n],
        Some(Value::Series(series)) => series.iter().map(|v| truthy(*v)).collect(),
        Some(Value::Scalar(v)) => vec![truthy(*v); n],
        Some(_) => vec![false; n],
    })
}

fn slot_last(
    env: &HashMap<String, Value>,
    name: Option<&str>,
    n: usize,
) -> Result<bool, EvalError> {
    Ok(match slot_value(env, name)? {
        None => false,
        Some(Value::Series(series)) => series.last().map(|v| truthy(*v)).unwrap_or(false),
        Some(Value::Scalar(v)) => n > 0 && truthy(*v),
        Some(_) => false,
    })
}

fn truthy(v: f64) -> bool {
    !v.is_nan() && v != 0.0
}

struct Evaluator<'a> {
    table: TableView<'a>,
    env: HashMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    fn eval(&mut self, expr: &LowExpr) -> Result<Value, EvalError> {
        match expr {
            LowExpr::Const(v) => Ok(Value::Scalar(*v)),
            LowExpr::StrConst(s) => Ok(Value::Str(s.clone())),
            LowExpr::Na => Ok(Value::Scalar(f64::NAN)),
            LowExpr::Price(price) => Ok(Value::Series(price_series(*price, self.table))),
            LowExpr::Local(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            LowExpr::Shift(inner, k) => {
                let value = self.eval(inner)?;
                Ok(shift(value, *k))
            }
            LowExpr::TupleGet(inner, index) => {
                let value = self.eval(inner)?;
                match value {
                    Value::Tuple(parts) => parts.get(*index).cloned().ok_or(EvalError::TupleIndex {
                        index: *index,
                        len: parts.len(),
                    }),
                    other => {
                        if *index == 0 {
                            Ok(other)
                        } else {
                            Err(EvalError::TupleIndex { index: *index, len: 1 })
                        }
                    }
                }
            }
            LowExpr::Unary(op, inner) => {
                let value = self.eval(inner)?;
                match op {
                    UnaryOpKind::Neg => map1(value, |v| -v),
                    UnaryOpKind::Not => map1(value, |v| if truthy(v) { 0.0 } else { 1.0 }),
                }
            }
            LowExpr::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, l, r)
            }
            LowExpr::Math1(op, inner) => {
                let value = self.eval(inner)?;
                let f = match op {
                    Math1::Abs => f64::abs,
                    Math1::Sqrt => f64::sqrt,
                    Math1::Log => f64::ln,
                    Math1::Log10 => f64::log10,
                    Math1::Ceil => f64::ceil,
                    Math1::Floor => f64::floor,
                    Math1::Round => f64::round,
                };
                map1(value, f)
            }
            LowExpr::Math2(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                let f = match op {
                    Math2::Max => f64::max,
                    Math2::Min => f64::min,
                    Math2::Pow => f64::powf,
                };
                map2(l, r, f)
            }
            LowExpr::Nz(inner, replacement) => {
                let value = self.eval(inner)?;
                let repl = self.eval(replacement)?;
                nz_value(value, repl)
            }
            LowExpr::Kernel(kernel, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call_kernel(*kernel, &values)
            }
        }
    }

    // ── kernel dispatch ──────────────────────────────────────

    fn call_kernel(&self, kernel: Kernel, args: &[Value]) -> Result<Value, EvalError> {
        let n = self.table.len();
        let series = |i: usize| series_arg(args, i, n);
        let scalar = |i: usize| scalar_arg(args, i);
        let period = |i: usize, name: &'static str| period_arg(args, i, name);

        let one = |v: Vec<f64>| -> Result<Value, EvalError> { Ok(Value::Series(v)) };
        let two = |(a, b): (Vec<f64>, Vec<f64>)| -> Result<Value, EvalError> {
            Ok(Value::Tuple(vec![Value::Series(a), Value::Series(b)]))
        };
        let three = |(a, b, c): (Vec<f64>, Vec<f64>, Vec<f64>)| -> Result<Value, EvalError> {
            Ok(Value::Tuple(vec![
                Value::Series(a),
                Value::Series(b),
                Value::Series(c),
            ]))
        };

        match kernel {
            Kernel::Sma => one(ta::sma(&series(0)?, period(1, "sma")?)),
            Kernel::Ema => one(ta::ema(&series(0)?, period(1, "ema")?)),
            Kernel::Rma => one(ta::rma(&series(0)?, period(1, "rma")?)),
            Kernel::Wma => one(ta::wma(&series(0)?, period(1, "wma")?)),
            Kernel::Vwma => one(ta::vwma(&series(0)?, &series(1)?, period(2, "vwma")?)),
            Kernel::Hma => one(ta::hma(&series(0)?, period(1, "hma")?)),
            Kernel::Alma => one(ta::alma(
                &series(0)?,
                period(1, "alma")?,
                scalar(2)?,
                scalar(3)?,
            )),
            Kernel::Swma => one(ta::swma(&series(0)?)),
            Kernel::Supertrend => two(ta::supertrend(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                scalar(3)?,
                period(4, "supertrend")?,
            )),
            Kernel::Sar => one(ta::sar(
                &series(0)?,
                &series(1)?,
                scalar(2)?,
                scalar(3)?,
                scalar(4)?,
            )),
            Kernel::Rsi => one(ta::rsi(&series(0)?, period(1, "rsi")?)),
            Kernel::Macd => three(ta::macd(
                &series(0)?,
                period(1, "macd")?,
                period(2, "macd")?,
                period(3, "macd")?,
            )),
            Kernel::Stoch => two(ta::stoch(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                period(3, "stoch")?,
                period(4, "stoch")?,
                period(5, "stoch")?,
            )),
            Kernel::Cci => one(ta::cci(&series(0)?, period(1, "cci")?)),
            Kernel::Mfi => one(ta::mfi(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                &series(3)?,
                period(4, "mfi")?,
            )),
            Kernel::Cmo => one(ta::cmo(&series(0)?, period(1, "cmo")?)),
            Kernel::Roc => one(ta::roc(&series(0)?, period(1, "roc")?)),
            Kernel::Tsi => one(ta::tsi(
                &series(0)?,
                period(1, "tsi")?,
                period(2, "tsi")?,
            )),
            Kernel::Mom => one(ta::mom(&series(0)?, period(1, "mom")?)),
            Kernel::Wpr => one(ta::wpr(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                period(3, "wpr")?,
            )),
            Kernel::PercentRank => one(ta::percentrank(&series(0)?, period(1, "percentrank")?)),
            Kernel::Cog => one(ta::cog(&series(0)?, period(1, "cog")?)),
            Kernel::Atr => one(ta::atr(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                period(3, "atr")?,
            )),
            Kernel::Bb => three(ta::bb(&series(0)?, period(1, "bb")?, scalar(2)?)),
            Kernel::Bbw => one(ta::bbw(&series(0)?, period(1, "bbw")?, scalar(2)?)),
            Kernel::Kc => three(ta::kc(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                &series(3)?,
                period(4, "kc")?,
                scalar(5)?,
            )),
            Kernel::Kcw => one(ta::kcw(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                &series(3)?,
                period(4, "kcw")?,
                scalar(5)?,
            )),
            Kernel::Dmi => three(ta::dmi(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                period(3, "dmi")?,
                period(4, "dmi")?,
            )),
            Kernel::Stdev => one(ta::stdev(
                &series(0)?,
                period(1, "stdev")?,
                scalar(2)? != 0.0,
            )),
            Kernel::Obv => one(ta::obv(&series(0)?, &series(1)?)),
            Kernel::AccDist => one(ta::accdist(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                &series(3)?,
            )),
            Kernel::Pvt => one(ta::pvt(&series(0)?, &series(1)?)),
            Kernel::Wad => one(ta::wad(&series(0)?, &series(1)?, &series(2)?)),
            Kernel::Vwap => one(ta::vwap(
                &series(0)?,
                &series(1)?,
                &series(2)?,
                &series(3)?,
            )),
            Kernel::Highest => one(ta::highest(&series(0)?, period(1, "highest")?)),
            Kernel::Lowest => one(ta::lowest(&series(0)?, period(1, "lowest")?)),
            Kernel::Change => one(ta::change(&series(0)?, period(1, "change")?)),
            Kernel::Median => one(ta::median(&series(0)?, period(1, "median")?)),
            Kernel::RangeIndicator => {
                one(ta::range_indicator(&series(0)?, period(1, "range_indicator")?))
            }
            Kernel::Linreg => {
                let offset = scalar(2)?;
                if !offset.is_finite() {
                    return Err(EvalError::BadPeriod {
                        kernel: "linreg",
                        value: offset,
                    });
                }
                one(ta::linreg(&series(0)?, period(1, "linreg")?, offset as i64))
            }
            Kernel::Rising => one(ta::rising(&series(0)?, period(1, "rising")?)),
            Kernel::Falling => one(ta::falling(&series(0)?, period(1, "falling")?)),
            Kernel::Cum => one(ta::cum(&series(0)?)),
            Kernel::Crossover => one(ta::crossover(&series(0)?, &series(1)?)),
            Kernel::Crossunder => one(ta::crossunder(&series(0)?, &series(1)?)),
            Kernel::Cross => one(ta::cross(&series(0)?, &series(1)?)),
        }
    }
}

// ── kernel argument access ──────────────────────────────────────────────

fn series_arg<'v>(args: &'v [Value], i: usize, n: usize) -> Result<Cow<'v, [f64]>, EvalError> {
    match &args[i] {
        Value::Series(v) => Ok(Cow::Borrowed(v.as_slice())),
        Value::Scalar(s) => Ok(Cow::Owned(vec![*s; n])),
        other => Err(EvalError::TypeMismatch(format!(
            "expected a series argument, got {}",
            value_kind(other)
        ))),
    }
}

fn scalar_arg(args: &[Value], i: usize) -> Result<f64, EvalError> {
    match &args[i] {
        Value::Scalar(s) => Ok(*s),
        other => Err(EvalError::TypeMismatch(format!(
            "expected a numeric argument, got {}",
            value_kind(other)
        ))),
    }
}

fn period_arg(args: &[Value], i: usize, name: &'static str) -> Result<usize, EvalError> {
    let v = scalar_arg(args, i)?;
    if !v.is_finite() || v < 1.0 {
        return Err(EvalError::BadPeriod {
            kernel: name,
            value: v,
        });
    }
    Ok(v as usize)
}

// ── element-wise value operations ───────────────────────────────────────

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Series(_) => "series",
        Value::Scalar(_) => "number",
        Value::Str(_) => "string",
        Value::Tuple(_) => "tuple",
    }
}

fn shift(value: Value, k: usize) -> Value {
    match value {
        Value::Series(series) => {
            let n = series.len();
            let mut out = vec![f64::NAN; n];
            if k < n {
                out[k..].copy_from_slice(&series[..n - k]);
            }
            Value::Series(out)
        }
        other => other,
    }
}

fn map1(value: Value, f: impl Fn(f64) -> f64) -> Result<Value, EvalError> {
    match value {
        Value::Series(series) => Ok(Value::Series(series.into_iter().map(f).collect())),
        Value::Scalar(v) => Ok(Value::Scalar(f(v))),
        other => Err(EvalError::TypeMismatch(format!(
            "numeric operation on {}",
            value_kind(&other)
        ))),
    }
}

fn map2(left: Value, right: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(a, b))),
        (Value::Series(a), Value::Scalar(b)) => {
            Ok(Value::Series(a.into_iter().map(|v| f(v, b)).collect()))
        }
        (Value::Scalar(a), Value::Series(b)) => {
            Ok(Value::Series(b.into_iter().map(|v| f(a, v)).collect()))
        }
        (Value::Series(a), Value::Series(b)) => Ok(Value::Series(
            a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect(),
        )),
        (l, r) => Err(EvalError::TypeMismatch(format!(
            "numeric operation on {} and {}",
            value_kind(&l),
            value_kind(&r)
        ))),
    }
}

fn binary(op: BinOpKind, left: Value, right: Value) -> Result<Value, EvalError> {
    // String equality is the one non-numeric comparison the dialect uses
    if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
        return match op {
            BinOpKind::Eq => Ok(Value::Scalar(if a == b { 1.0 } else { 0.0 })),
            BinOpKind::Ne => Ok(Value::Scalar(if a != b { 1.0 } else { 0.0 })),
            _ => Err(EvalError::TypeMismatch("arithmetic on strings".into())),
        };
    }

    let f: fn(f64, f64) -> f64 = match op {
        BinOpKind::Add => |a, b| a + b,
        BinOpKind::Sub => |a, b| a - b,
        BinOpKind::Mul => |a, b| a * b,
        BinOpKind::Div => |a, b| a / b,
        BinOpKind::Rem => |a, b| a % b,
        // Comparisons against NaN are false, Ne included
        BinOpKind::Gt => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a > b),
        BinOpKind::Lt => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a < b),
        BinOpKind::Ge => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a >= b),
        BinOpKind::Le => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a <= b),
        BinOpKind::Eq => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a == b),
        BinOpKind::Ne => |a, b| bool_f(!a.is_nan() && !b.is_nan() && a != b),
        BinOpKind::And => |a, b| bool_f(truthy(a) && truthy(b)),
        BinOpKind::Or => |a, b| bool_f(truthy(a) || truthy(b)),
    };
    map2(left, right, f)
}

fn bool_f(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn nz_value(value: Value, replacement: Value) -> Result<Value, EvalError> {
    match (value, replacement) {
        (Value::Series(series), Value::Scalar(r)) => Ok(Value::Series(ta::nz(&series, r))),
        (Value::Series(series), Value::Series(repl)) => Ok(Value::Series(
            series
                .into_iter()
                .zip(repl)
                .map(|(v, r)| if v.is_nan() { r } else { v })
                .collect(),
        )),
        (Value::Scalar(v), Value::Scalar(r)) => {
            Ok(Value::Scalar(if v.is_nan() { r } else { v }))
        }
        (v, r) => Err(EvalError::TypeMismatch(format!(
            "nz on {} with {} replacement",
            value_kind(&v),
            value_kind(&r)
        ))),
    }
}
