//! Lowering from the parsed AST to the fixed-opcode expression program the
//! evaluator executes.
//!
//! This stage resolves price builtins, injects the implicit OHLCV arguments
//! the source dialect omits, maps `math.*` and `nz`, classifies the
//! `if`-block actions into the four signal slots, extracts the input
//! schema and strategy settings, and estimates the warmup length.

use std::collections::BTreeMap;

use thiserror::Error;

use super::ast::{
    ActionKind, BinOpKind, Expr, InputDecl, LitValue, Program, StrategyAction, UnaryOpKind,
};
use super::strategy::{CompiledStrategy, InputParam, Step, StrategySettings};

#[derive(Debug, Clone, Error)]
pub enum CodeGenError {
    #[error("unknown indicator function 'ta.{0}'")]
    UnknownIndicator(String),
    #[error("unknown math function 'math.{0}'")]
    UnknownMath(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unsupported property '{ns}.{name}'")]
    UnsupportedProperty { ns: String, name: String },
    #[error("'ta.{name}' takes at most {max} arguments, got {got}")]
    TooManyArgs { name: &'static str, max: usize, got: usize },
    #[error("'ta.{name}' missing required argument '{param}'")]
    MissingArg { name: &'static str, param: &'static str },
    #[error("'ta.{name}' got an unexpected keyword argument '{kw}'")]
    UnknownKwarg { name: &'static str, kw: String },
    #[error("'nz' requires at least one argument")]
    NzWithoutArgs,
}

/// Price builtins resolvable without allocation from the bound table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriceSeries {
    Open,
    High,
    Low,
    Close,
    Volume,
    Hl2,
    Hlc3,
    Hlcc4,
    Ohlc4,
}

impl PriceSeries {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "open" => PriceSeries::Open,
            "high" => PriceSeries::High,
            "low" => PriceSeries::Low,
            "close" => PriceSeries::Close,
            "volume" => PriceSeries::Volume,
            "hl2" => PriceSeries::Hl2,
            "hlc3" => PriceSeries::Hlc3,
            "hlcc4" => PriceSeries::Hlcc4,
            "ohlc4" => PriceSeries::Ohlc4,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Math1 {
    Abs,
    Sqrt,
    Log,
    Log10,
    Ceil,
    Floor,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Math2 {
    Max,
    Min,
    Pow,
}

/// The indicator kernels addressable from lowered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kernel {
    Sma,
    Ema,
    Rma,
    Wma,
    Vwma,
    Hma,
    Alma,
    Swma,
    Supertrend,
    Sar,
    Rsi,
    Macd,
    Stoch,
    Cci,
    Mfi,
    Cmo,
    Roc,
    Tsi,
    Mom,
    Wpr,
    PercentRank,
    Cog,
    Atr,
    Bb,
    Bbw,
    Kc,
    Kcw,
    Dmi,
    Stdev,
    Obv,
    AccDist,
    Pvt,
    Wad,
    Vwap,
    Highest,
    Lowest,
    Change,
    Median,
    RangeIndicator,
    Linreg,
    Rising,
    Falling,
    Cum,
    Crossover,
    Crossunder,
    Cross,
}

impl Kernel {
    /// Number of series a call yields; >1 means a tuple result.
    pub(crate) fn outputs(self) -> usize {
        match self {
            Kernel::Supertrend | Kernel::Stoch => 2,
            Kernel::Macd | Kernel::Bb | Kernel::Kc | Kernel::Dmi => 3,
            _ => 1,
        }
    }
}

/// Lowered expression tree. Binary/unary operators reuse the AST kinds;
/// everything name-shaped has been resolved.
#[derive(Debug, Clone)]
pub(crate) enum LowExpr {
    Const(f64),
    StrConst(String),
    Na,
    Price(PriceSeries),
    Local(String),
    Shift(Box<LowExpr>, usize),
    TupleGet(Box<LowExpr>, usize),
    Unary(UnaryOpKind, Box<LowExpr>),
    Binary(BinOpKind, Box<LowExpr>, Box<LowExpr>),
    Math1(Math1, Box<LowExpr>),
    Math2(Math2, Box<LowExpr>, Box<LowExpr>),
    Nz(Box<LowExpr>, Box<LowExpr>),
    Kernel(Kernel, Vec<LowExpr>),
}

impl LowExpr {
    fn outputs(&self) -> usize {
        match self {
            LowExpr::Kernel(kernel, _) => kernel.outputs(),
            LowExpr::TupleGet(..) => 1,
            _ => 1,
        }
    }
}

/// Which condition variable feeds each signal slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct SignalBindings {
    pub long_entries: Option<String>,
    pub long_exits: Option<String>,
    pub short_entries: Option<String>,
    pub short_exits: Option<String>,
}

/// Generate the compiled strategy from a parsed program.
pub fn generate(program: &Program, source: &str) -> Result<CompiledStrategy, CodeGenError> {
    let mut gen = Generator {
        inputs: BTreeMap::new(),
        max_period: 0,
    };

    for input in &program.inputs {
        let param = gen.lower_input(input);
        gen.inputs.insert(input.var_name.clone(), param);
    }

    let mut steps = Vec::with_capacity(program.assignments.len());
    for assign in &program.assignments {
        let expr = gen.lower_expr(&assign.expr)?;
        steps.push(Step {
            targets: assign.targets.clone(),
            expr,
        });
    }

    let slots = classify_signals(program);
    let settings = extract_settings(program);

    let name = program
        .strategy_decl
        .as_ref()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "Unnamed".to_string());

    Ok(CompiledStrategy {
        name,
        input_schema: gen.inputs,
        settings,
        warmup: (gen.max_period * 3).max(50),
        source: source.to_string(),
        steps,
        slots,
    })
}

struct Generator {
    inputs: BTreeMap<String, InputParam>,
    max_period: usize,
}

// ── implicit-argument injection tables ──────────────────────────────────

/// One parameter of a kernel's source-facing signature (after injection).
struct Param {
    name: &'static str,
    default: Option<f64>,
}

const fn req(name: &'static str) -> Param {
    Param { name, default: None }
}

const fn opt(name: &'static str, default: f64) -> Param {
    Param {
        name,
        default: Some(default),
    }
}

/// What the lowering injects before mapping the user's arguments.
enum Inject {
    /// Arguments pass through unchanged.
    Direct,
    /// Prepend high, low, close.
    Hlc,
    /// Prepend high, low.
    Hl,
    /// Insert the given prices after the first user argument.
    AfterSource(&'static [PriceSeries]),
    /// Drop the user's source argument entirely (the kernel derives its
    /// own typical price) and prepend high, low, close, volume.
    ReplaceSourceHlcv,
}

struct KernelSpec {
    kernel: Kernel,
    inject: Inject,
    /// User-facing parameters, excluding whatever `inject` supplies.
    params: &'static [Param],
}

fn kernel_spec(name: &str) -> Option<(&'static str, KernelSpec)> {
    use Inject::*;
    use Kernel::*;
    let spec = match name {
        "sma" => ("sma", KernelSpec { kernel: Sma, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "ema" => ("ema", KernelSpec { kernel: Ema, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "rma" => ("rma", KernelSpec { kernel: Rma, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "wma" => ("wma", KernelSpec { kernel: Wma, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "vwma" => ("vwma", KernelSpec { kernel: Vwma, inject: AfterSource(&[PriceSeries::Volume]), params: &const { [req("source"), req("length")] } }),
        "hma" => ("hma", KernelSpec { kernel: Hma, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "alma" => ("alma", KernelSpec { kernel: Alma, inject: Direct, params: &const { [req("source"), req("length"), opt("offset", 0.85), opt("sigma", 6.0)] } }),
        "swma" => ("swma", KernelSpec { kernel: Swma, inject: Direct, params: &const { [req("source")] } }),
        "supertrend" => ("supertrend", KernelSpec { kernel: Supertrend, inject: Hlc, params: &const { [opt("factor", 3.0), opt("period", 10.0)] } }),
        "sar" => ("sar", KernelSpec { kernel: Sar, inject: Hl, params: &const { [opt("start", 0.02), opt("inc", 0.02), opt("max", 0.2)] } }),
        "rsi" => ("rsi", KernelSpec { kernel: Rsi, inject: Direct, params: &const { [req("source"), opt("length", 14.0)] } }),
        "macd" => ("macd", KernelSpec { kernel: Macd, inject: Direct, params: &const { [req("source"), opt("fast_length", 12.0), opt("slow_length", 26.0), opt("signal_length", 9.0)] } }),
        "stoch" => ("stoch", KernelSpec { kernel: Stoch, inject: Direct, params: &const { [req("source"), req("high"), req("low"), opt("length", 14.0)] } }),
        "cci" => ("cci", KernelSpec { kernel: Cci, inject: Direct, params: &const { [req("source"), opt("length", 20.0)] } }),
        "mfi" => ("mfi", KernelSpec { kernel: Mfi, inject: ReplaceSourceHlcv, params: &const { [req("source"), opt("length", 14.0)] } }),
        "cmo" => ("cmo", KernelSpec { kernel: Cmo, inject: Direct, params: &const { [req("source"), opt("length", 14.0)] } }),
        "roc" => ("roc", KernelSpec { kernel: Roc, inject: Direct, params: &const { [req("source"), opt("length", 14.0)] } }),
        "tsi" => ("tsi", KernelSpec { kernel: Tsi, inject: Direct, params: &const { [req("source"), opt("short_length", 13.0), opt("long_length", 25.0)] } }),
        "mom" => ("mom", KernelSpec { kernel: Mom, inject: Direct, params: &const { [req("source"), opt("length", 10.0)] } }),
        "wpr" => ("wpr", KernelSpec { kernel: Wpr, inject: Hlc, params: &const { [opt("length", 14.0)] } }),
        "percentrank" => ("percentrank", KernelSpec { kernel: PercentRank, inject: Direct, params: &const { [req("source"), opt("length", 20.0)] } }),
        "cog" => ("cog", KernelSpec { kernel: Cog, inject: Direct, params: &const { [req("source"), opt("length", 10.0)] } }),
        "atr" => ("atr", KernelSpec { kernel: Atr, inject: Hlc, params: &const { [opt("length", 14.0)] } }),
        "bb" => ("bb", KernelSpec { kernel: Bb, inject: Direct, params: &const { [req("source"), opt("length", 20.0), opt("mult", 2.0)] } }),
        "bbw" => ("bbw", KernelSpec { kernel: Bbw, inject: Direct, params: &const { [req("source"), opt("length", 20.0), opt("mult", 2.0)] } }),
        "kc" => ("kc", KernelSpec { kernel: Kc, inject: AfterSource(&[PriceSeries::High, PriceSeries::Low, PriceSeries::Close]), params: &const { [req("source"), opt("length", 20.0), opt("mult", 1.5)] } }),
        "kcw" => ("kcw", KernelSpec { kernel: Kcw, inject: AfterSource(&[PriceSeries::High, PriceSeries::Low, PriceSeries::Close]), params: &const { [req("source"), opt("length", 20.0), opt("mult", 1.5)] } }),
        "dmi" => ("dmi", KernelSpec { kernel: Dmi, inject: Hlc, params: &const { [opt("di_length", 14.0), opt("adx_smoothing", 14.0)] } }),
        "stdev" => ("stdev", KernelSpec { kernel: Stdev, inject: Direct, params: &const { [req("source"), opt("length", 20.0), opt("biased", 1.0)] } }),
        "obv" => ("obv", KernelSpec { kernel: Obv, inject: Direct, params: &const { [req("source"), req("volume")] } }),
        "accdist" => ("accdist", KernelSpec { kernel: AccDist, inject: Direct, params: &const { [req("high"), req("low"), req("close"), req("volume")] } }),
        "pvt" => ("pvt", KernelSpec { kernel: Pvt, inject: Direct, params: &const { [req("source"), req("volume")] } }),
        "wad" => ("wad", KernelSpec { kernel: Wad, inject: Direct, params: &const { [req("high"), req("low"), req("close")] } }),
        "vwap" => ("vwap", KernelSpec { kernel: Vwap, inject: Direct, params: &const { [req("high"), req("low"), req("close"), req("volume")] } }),
        "highest" => ("highest", KernelSpec { kernel: Highest, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "lowest" => ("lowest", KernelSpec { kernel: Lowest, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "change" => ("change", KernelSpec { kernel: Change, inject: Direct, params: &const { [req("source"), opt("length", 1.0)] } }),
        "median" => ("median", KernelSpec { kernel: Median, inject: Direct, params: &const { [req("source"), req("length")] } }),
        // `ta.range` collides with the language range type; renamed internally
        "range" => ("range_indicator", KernelSpec { kernel: RangeIndicator, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "linreg" => ("linreg", KernelSpec { kernel: Linreg, inject: Direct, params: &const { [req("source"), req("length"), opt("offset", 0.0)] } }),
        "rising" => ("rising", KernelSpec { kernel: Rising, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "falling" => ("falling", KernelSpec { kernel: Falling, inject: Direct, params: &const { [req("source"), req("length")] } }),
        "cum" => ("cum", KernelSpec { kernel: Cum, inject: Direct, params: &const { [req("source")] } }),
        "crossover" => ("crossover", KernelSpec { kernel: Crossover, inject: Direct, params: &const { [req("a"), req("b")] } }),
        "crossunder" => ("crossunder", KernelSpec { kernel: Crossunder, inject: Direct, params: &const { [req("a"), req("b")] } }),
        "cross" => ("cross", KernelSpec { kernel: Cross, inject: Direct, params: &const { [req("a"), req("b")] } }),
        _ => return None,
    };
    Some(spec)
}

/// Bare property indicators: `ta.obv` and friends, called without parens.
fn property_indicator(name: &str) -> Option<(Kernel, &'static [PriceSeries])> {
    use PriceSeries::*;
    Some(match name {
        "obv" => (Kernel::Obv, &[Close, Volume]),
        "accdist" => (Kernel::AccDist, &[High, Low, Close, Volume]),
        "pvt" => (Kernel::Pvt, &[Close, Volume]),
        "wad" => (Kernel::Wad, &[High, Low, Close]),
        "vwap" => (Kernel::Vwap, &[High, Low, Close, Volume]),
        _ => return None,
    })
}

impl Generator {
    // ── input schema ─────────────────────────────────────────

    fn lower_input(&mut self, input: &InputDecl) -> InputParam {
        let kw_f64 = |key: &str| -> Option<f64> {
            input
                .kwargs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.as_f64())
        };

        match input.input_type.as_str() {
            "int" => InputParam::Int {
                default: input.default.as_f64().unwrap_or(0.0) as i64,
                title: input.title.clone(),
                min: kw_f64("minval").map(|v| v as i64),
                max: kw_f64("maxval").map(|v| v as i64),
                step: kw_f64("step").map(|v| v as i64).unwrap_or(1),
            },
            "float" => InputParam::Float {
                default: input.default.as_f64().unwrap_or(0.0),
                title: input.title.clone(),
                min: kw_f64("minval"),
                max: kw_f64("maxval"),
                step: kw_f64("step").unwrap_or(0.1),
            },
            "bool" => InputParam::Bool {
                default: match &input.default {
                    LitValue::Bool(b) => *b,
                    other => other.as_f64().map(|v| v != 0.0).unwrap_or(false),
                },
                title: input.title.clone(),
            },
            // "string", "source" and anything newer
            _ => InputParam::Text {
                default: input.default.display(),
                title: input.title.clone(),
                options: None,
            },
        }
    }

    // ── expression lowering ──────────────────────────────────

    fn lower_expr(&mut self, expr: &Expr) -> Result<LowExpr, CodeGenError> {
        match expr {
            Expr::Literal(lit) => Ok(lower_literal(lit)),
            Expr::Ident(name) => Ok(self.lower_ident(name)),
            Expr::Property { ns, name } => self.lower_property(ns, name),
            Expr::Call { ns, name, args, kwargs } => self.lower_call(ns.as_deref(), name, args, kwargs),
            Expr::Subscript { expr, index } => {
                let inner = self.lower_expr(expr)?;
                if inner.outputs() > 1 {
                    Ok(LowExpr::TupleGet(Box::new(inner), *index))
                } else {
                    Ok(LowExpr::Shift(Box::new(inner), *index))
                }
            }
            Expr::Unary { op, operand } => {
                let inner = self.lower_expr(operand)?;
                Ok(LowExpr::Unary(*op, Box::new(inner)))
            }
            Expr::Binary { op, left, right } => {
                let l = self.lower_expr(left)?;
                let r = self.lower_expr(right)?;
                Ok(LowExpr::Binary(*op, Box::new(l), Box::new(r)))
            }
        }
    }

    fn lower_ident(&self, name: &str) -> LowExpr {
        if let Some(price) = PriceSeries::from_name(name) {
            return LowExpr::Price(price);
        }
        LowExpr::Local(name.to_string())
    }

    fn lower_property(&mut self, ns: &str, name: &str) -> Result<LowExpr, CodeGenError> {
        if ns == "ta" {
            if let Some((kernel, prices)) = property_indicator(name) {
                let args = prices.iter().map(|p| LowExpr::Price(*p)).collect();
                return Ok(LowExpr::Kernel(kernel, args));
            }
        }
        if ns == "strategy" {
            // Opaque tag consumed only by the action classifier
            return Ok(LowExpr::StrConst(format!("strategy.{name}")));
        }
        Err(CodeGenError::UnsupportedProperty {
            ns: ns.to_string(),
            name: name.to_string(),
        })
    }

    fn lower_call(
        &mut self,
        ns: Option<&str>,
        name: &str,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<LowExpr, CodeGenError> {
        match ns {
            None if name == "nz" => {
                if args.is_empty() {
                    return Err(CodeGenError::NzWithoutArgs);
                }
                let inner = self.lower_expr(&args[0])?;
                let replacement = if args.len() >= 2 {
                    self.lower_expr(&args[1])?
                } else {
                    LowExpr::Const(0.0)
                };
                Ok(LowExpr::Nz(Box::new(inner), Box::new(replacement)))
            }
            Some("math") => self.lower_math(name, args),
            Some("ta") => self.lower_ta(name, args, kwargs),
            // input.* never appears in expression position in valid scripts
            Some("input") => Ok(LowExpr::Na),
            Some(ns) => Err(CodeGenError::UnknownFunction(format!("{ns}.{name}"))),
            None => Err(CodeGenError::UnknownFunction(name.to_string())),
        }
    }

    fn lower_math(&mut self, name: &str, args: &[Expr]) -> Result<LowExpr, CodeGenError> {
        let m1 = match name {
            "abs" => Some(Math1::Abs),
            "sqrt" => Some(Math1::Sqrt),
            "log" => Some(Math1::Log),
            "log10" => Some(Math1::Log10),
            "ceil" => Some(Math1::Ceil),
            "floor" => Some(Math1::Floor),
            "round" => Some(Math1::Round),
            _ => None,
        };
        if let Some(op) = m1 {
            let first = args
                .first()
                .ok_or_else(|| CodeGenError::UnknownMath(name.to_string()))?;
            let inner = self.lower_expr(first)?;
            return Ok(LowExpr::Math1(op, Box::new(inner)));
        }

        let m2 = match name {
            "max" => Some(Math2::Max),
            "min" => Some(Math2::Min),
            "pow" => Some(Math2::Pow),
            _ => None,
        };
        if let Some(op) = m2 {
            if args.len() < 2 {
                return Err(CodeGenError::UnknownMath(name.to_string()));
            }
            let a = self.lower_expr(&args[0])?;
            let b = self.lower_expr(&args[1])?;
            return Ok(LowExpr::Math2(op, Box::new(a), Box::new(b)));
        }

        Err(CodeGenError::UnknownMath(name.to_string()))
    }

    fn lower_ta(
        &mut self,
        name: &str,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<LowExpr, CodeGenError> {
        let (spec_name, spec) = match kernel_spec(name) {
            Some(s) => s,
            None => return Err(CodeGenError::UnknownIndicator(name.to_string())),
        };

        self.track_periods(args);

        // Map user args (positional then keyword) onto the signature slots
        if args.len() > spec.params.len() {
            return Err(CodeGenError::TooManyArgs {
                name: spec_name,
                max: spec.params.len(),
                got: args.len(),
            });
        }
        let mut user: Vec<Option<LowExpr>> = Vec::with_capacity(spec.params.len());
        for arg in args {
            user.push(Some(self.lower_expr(arg)?));
        }
        user.resize_with(spec.params.len(), || None);

        for (kw, value) in kwargs {
            let idx = spec
                .params
                .iter()
                .position(|p| p.name == kw)
                .ok_or_else(|| CodeGenError::UnknownKwarg {
                    name: spec_name,
                    kw: kw.clone(),
                })?;
            user[idx] = Some(self.lower_expr(value)?);
        }

        let mut resolved = Vec::with_capacity(spec.params.len());
        for (param, slot) in spec.params.iter().zip(user) {
            match slot {
                Some(expr) => resolved.push(expr),
                None => match param.default {
                    Some(v) => resolved.push(LowExpr::Const(v)),
                    None => {
                        return Err(CodeGenError::MissingArg {
                            name: spec_name,
                            param: param.name,
                        })
                    }
                },
            }
        }

        // Apply the injection rule
        let price = |p: PriceSeries| LowExpr::Price(p);
        let final_args = match spec.inject {
            Inject::Direct => resolved,
            Inject::Hlc => {
                let mut all = vec![
                    price(PriceSeries::High),
                    price(PriceSeries::Low),
                    price(PriceSeries::Close),
                ];
                all.extend(resolved);
                all
            }
            Inject::Hl => {
                let mut all = vec![price(PriceSeries::High), price(PriceSeries::Low)];
                all.extend(resolved);
                all
            }
            Inject::AfterSource(prices) => {
                let mut iter = resolved.into_iter();
                let mut all = Vec::new();
                if let Some(source) = iter.next() {
                    all.push(source);
                }
                all.extend(prices.iter().map(|p| price(*p)));
                all.extend(iter);
                all
            }
            Inject::ReplaceSourceHlcv => {
                // Money flow is defined on typical price; the declared
                // source argument carries no information for the kernel.
                let mut iter = resolved.into_iter();
                let _source = iter.next();
                let mut all = vec![
                    price(PriceSeries::High),
                    price(PriceSeries::Low),
                    price(PriceSeries::Close),
                    price(PriceSeries::Volume),
                ];
                all.extend(iter);
                all
            }
        };

        // Source-facing ta.stoch is the raw %K: unsmoothed, first of the pair
        if spec.kernel == Kernel::Stoch {
            let mut call_args = final_args;
            call_args.push(LowExpr::Const(1.0));
            call_args.push(LowExpr::Const(1.0));
            return Ok(LowExpr::TupleGet(
                Box::new(LowExpr::Kernel(Kernel::Stoch, call_args)),
                0,
            ));
        }

        Ok(LowExpr::Kernel(spec.kernel, final_args))
    }

    /// Track the maximum plausible period argument for warmup estimation.
    /// Literal numbers in 1..=1000 and defaults of referenced int/float
    /// inputs both count.
    fn track_periods(&mut self, args: &[Expr]) {
        for arg in args {
            match arg {
                Expr::Literal(lit) => {
                    if let Some(v) = lit.as_f64() {
                        let v = v as i64;
                        if (1..=1000).contains(&v) {
                            self.max_period = self.max_period.max(v as usize);
                        }
                    }
                }
                Expr::Ident(name) => match self.inputs.get(name) {
                    Some(InputParam::Int { default, .. }) => {
                        if *default >= 1 {
                            self.max_period = self.max_period.max(*default as usize);
                        }
                    }
                    Some(InputParam::Float { default, .. }) => {
                        if *default >= 1.0 {
                            self.max_period = self.max_period.max(*default as usize);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

fn lower_literal(lit: &LitValue) -> LowExpr {
    match lit {
        LitValue::Int(v) => LowExpr::Const(*v as f64),
        LitValue::Float(v) => LowExpr::Const(*v),
        LitValue::Str(s) => LowExpr::StrConst(s.clone()),
        LitValue::Bool(b) => LowExpr::Const(if *b { 1.0 } else { 0.0 }),
        LitValue::Na => LowExpr::Na,
    }
}

// ── signal classification ───────────────────────────────────────────────

/// Bind if-block condition names to signal slots. When several blocks bind
/// the same slot, the last one wins.
fn classify_signals(program: &Program) -> SignalBindings {
    let mut slots = SignalBindings::default();
    for block in &program.if_blocks {
        for action in &block.body {
            let cond = Some(block.condition_name.clone());
            match classify_action(action) {
                Some(SignalSlot::LongEntries) => slots.long_entries = cond,
                Some(SignalSlot::LongExits) => slots.long_exits = cond,
                Some(SignalSlot::ShortEntries) => slots.short_entries = cond,
                Some(SignalSlot::ShortExits) => slots.short_exits = cond,
                None => {}
            }
        }
    }
    slots
}

enum SignalSlot {
    LongEntries,
    LongExits,
    ShortEntries,
    ShortExits,
}

fn classify_action(action: &StrategyAction) -> Option<SignalSlot> {
    match action.action {
        ActionKind::Entry => {
            if action.args.len() >= 2 {
                let direction = expr_label(&action.args[1]);
                if direction.contains("long") {
                    return Some(SignalSlot::LongEntries);
                }
                if direction.contains("short") {
                    return Some(SignalSlot::ShortEntries);
                }
            }
            Some(SignalSlot::LongEntries)
        }
        ActionKind::Close => {
            // Textual heuristic: a label that spells "short" in any script
            // the builder emits routes the close to the short side.
            if let Some(label) = action.args.first() {
                let label = expr_label(label);
                if label.to_lowercase().contains("short") || label.contains('空') {
                    return Some(SignalSlot::ShortExits);
                }
            }
            Some(SignalSlot::LongExits)
        }
        // Stop/take-profit orders are out of scope
        ActionKind::Exit => None,
    }
}

/// Flat string form of an expression for label/direction matching.
fn expr_label(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => lit.display(),
        Expr::Ident(name) => name.clone(),
        Expr::Property { ns, name } => format!("{ns}.{name}"),
        _ => String::new(),
    }
}

// ── settings extraction ─────────────────────────────────────────────────

fn extract_settings(program: &Program) -> StrategySettings {
    let mut settings = StrategySettings::default();
    let Some(decl) = &program.strategy_decl else {
        return settings;
    };

    for (key, value) in &decl.kwargs {
        match key.as_str() {
            "initial_capital" => settings.initial_capital = value.as_f64(),
            "commission_value" => settings.commission_value = value.as_f64(),
            "slippage" => settings.slippage = value.as_f64(),
            "default_qty_value" => settings.default_qty_value = value.as_f64(),
            "default_qty_type" => settings.default_qty_type = Some(value.display()),
            "pyramiding" => settings.pyramiding = value.as_f64().map(|v| v as i64),
            "currency" => settings.currency = Some(value.display()),
            // Unknown keys ignored
            _ => {}
        }
    }
    settings
}
