//! Compiled-strategy shape: input schema, settings, parameter values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lower::{LowExpr, SignalBindings};

/// One entry of the input-parameter schema, the contract the engine
/// exposes to callers for overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputParam {
    Int {
        default: i64,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
        step: i64,
    },
    Float {
        default: f64,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        step: f64,
    },
    Bool {
        default: bool,
        title: String,
    },
    /// `string` and `source` inputs.
    Text {
        default: String,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
    },
}

impl InputParam {
    pub fn title(&self) -> &str {
        match self {
            InputParam::Int { title, .. }
            | InputParam::Float { title, .. }
            | InputParam::Bool { title, .. }
            | InputParam::Text { title, .. } => title,
        }
    }

    /// The default as a runtime parameter value.
    pub fn default_value(&self) -> ParamValue {
        match self {
            InputParam::Int { default, .. } => ParamValue::Int(*default),
            InputParam::Float { default, .. } => ParamValue::Float(*default),
            InputParam::Bool { default, .. } => ParamValue::Bool(*default),
            InputParam::Text { default, .. } => ParamValue::Str(default.clone()),
        }
    }
}

/// A runtime value for one strategy input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Str(_) => None,
        }
    }
}

/// Settings from the `strategy(...)` declaration. Absent keys fall back to
/// the engine defaults at run time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySettings {
    pub initial_capital: Option<f64>,
    pub commission_value: Option<f64>,
    pub slippage: Option<f64>,
    pub default_qty_value: Option<f64>,
    pub default_qty_type: Option<String>,
    pub pyramiding: Option<i64>,
    pub currency: Option<String>,
}

impl StrategySettings {
    pub const DEFAULT_CAPITAL: f64 = 10_000.0;
    pub const DEFAULT_COMMISSION: f64 = 0.001;
    pub const DEFAULT_SLIPPAGE: f64 = 0.0005;

    pub fn capital(&self) -> f64 {
        self.initial_capital.unwrap_or(Self::DEFAULT_CAPITAL)
    }

    pub fn commission(&self) -> f64 {
        self.commission_value.unwrap_or(Self::DEFAULT_COMMISSION)
    }

    pub fn slippage_frac(&self) -> f64 {
        self.slippage.unwrap_or(Self::DEFAULT_SLIPPAGE)
    }
}

/// One straight-line statement of the lowered program.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub targets: Vec<String>,
    pub expr: LowExpr,
}

/// The compiled form of a strategy script.
///
/// Immutable after construction and shareable by reference between
/// concurrent backtests; `batch` and `step` are driven from the same
/// lowered program, so their booleans agree by construction.
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    pub name: String,
    pub input_schema: BTreeMap<String, InputParam>,
    pub settings: StrategySettings,
    /// Leading bars during which indicator outputs are not yet stable.
    pub warmup: usize,
    /// The original script text.
    pub source: String,
    pub(crate) steps: Vec<Step>,
    pub(crate) slots: SignalBindings,
}

/// The four boolean signal vectors a `batch` evaluation produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalVectors {
    pub long_entries: Vec<bool>,
    pub long_exits: Vec<bool>,
    pub short_entries: Vec<bool>,
    pub short_exits: Vec<bool>,
}

impl SignalVectors {
    pub fn all_false(n: usize) -> Self {
        Self {
            long_entries: vec![false; n],
            long_exits: vec![false; n],
            short_entries: vec![false; n],
            short_exits: vec![false; n],
        }
    }

    pub fn len(&self) -> usize {
        self.long_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.long_entries.is_empty()
    }
}
