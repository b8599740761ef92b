//! Compiler integration: builder-shaped scripts through tokenize, parse
//! and generate, checked at the compiled-strategy surface.

use std::collections::HashMap;

use pinelab_core::pine::eval::TableView;
use pinelab_core::pine::tokens::{tokenize, TokenKind};
use pinelab_core::pine::{compile, InputParam, ParamValue};

const BUILDER_SCRIPT: &str = r#"//@version=6
strategy("SuperTrend + RSI", initial_capital=20000, commission_value=0.0008, slippage=0.0002, pyramiding=0, default_qty_type=strategy.percent_of_equity, default_qty_value=100)

// inputs
stFactor = input.float(3.0, "SuperTrend Factor", minval=0.5, maxval=10, step=0.5)
stPeriod = input.int(10, "SuperTrend Period", minval=1, maxval=50)
rsiLength = input.int(14, "RSI Length", minval=2)

// indicators
[stValue, stDir] = ta.supertrend(stFactor, stPeriod)
rsiValue = ta.rsi(close, rsiLength)

// conditions
longEntryCondition = ta.crossunder(stDir, 0) and rsiValue > 50
longExitCondition = ta.crossover(stDir, 0) or rsiValue < 5

if longEntryCondition
    strategy.entry("Long", strategy.long)
if longExitCondition
    strategy.close("Long")
"#;

#[test]
fn token_stream_terminates_with_single_eof() {
    let tokens = tokenize(BUILDER_SCRIPT);
    let eof_count = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
    assert_eq!(eof_count, 1);
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);

    let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
    let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
    assert_eq!(indents, dedents);
}

#[test]
fn token_lines_point_into_source() {
    let tokens = tokenize(BUILDER_SCRIPT);
    let line_count = BUILDER_SCRIPT.lines().count() as u32;
    for token in &tokens {
        assert!(token.line <= line_count, "token {token} beyond source");
    }
}

#[test]
fn builder_script_compiles() {
    let strategy = compile(BUILDER_SCRIPT).unwrap();
    assert_eq!(strategy.name, "SuperTrend + RSI");
    assert_eq!(strategy.input_schema.len(), 3);
    assert_eq!(strategy.settings.initial_capital, Some(20_000.0));
    assert_eq!(strategy.settings.pyramiding, Some(0));
    assert_eq!(
        strategy.settings.default_qty_type.as_deref(),
        Some("strategy.percent_of_equity")
    );
    // Largest tracked period default is rsiLength=14... and stPeriod=10,
    // but the literal 85/70 thresholds are comparisons, not call args.
    // warmup = max(3 * 14, 50)
    assert_eq!(strategy.warmup, 50);
}

#[test]
fn schema_serializes_with_kind_tags() {
    let strategy = compile(BUILDER_SCRIPT).unwrap();
    let json = serde_json::to_value(&strategy.input_schema).unwrap();
    assert_eq!(json["stPeriod"]["kind"], "int");
    assert_eq!(json["stPeriod"]["default"], 10);
    assert_eq!(json["stFactor"]["kind"], "float");
    assert_eq!(json["stFactor"]["min"], 0.5);
}

#[test]
fn float_input_bounds_preserved() {
    let strategy = compile(BUILDER_SCRIPT).unwrap();
    let InputParam::Float { min, max, step, .. } = &strategy.input_schema["stFactor"] else {
        panic!("stFactor is not a float input");
    };
    assert_eq!(*min, Some(0.5));
    assert_eq!(*max, Some(10.0));
    assert_eq!(*step, 0.5);
}

#[test]
fn compiled_strategy_runs_on_data() {
    let strategy = compile(BUILDER_SCRIPT).unwrap();

    // Rise then fall: the SuperTrend direction must flip both ways
    let n = 200;
    let mut close = Vec::with_capacity(n);
    for i in 0..100 {
        close.push(100.0 + 2.0 * i as f64);
    }
    for i in 0..100 {
        close.push(298.0 - 2.0 * i as f64);
    }
    let open: Vec<f64> = close.iter().map(|c| c - 0.25).collect();
    let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
    let volume = vec![1000.0; n];

    let view = TableView {
        open: &open,
        high: &high,
        low: &low,
        close: &close,
        volume: &volume,
    };
    let signals = strategy.batch(view, &HashMap::new()).unwrap();

    assert_eq!(signals.long_entries.len(), n);
    assert!(signals.long_entries.iter().any(|b| *b), "no entries fired");
    assert!(signals.long_exits.iter().any(|b| *b), "no exits fired");
}

#[test]
fn overrides_change_signal_timing() {
    let strategy = compile(BUILDER_SCRIPT).unwrap();
    let mut overrides = HashMap::new();
    overrides.insert("stPeriod".to_string(), ParamValue::Int(30));

    let n = 200;
    let mut close = Vec::with_capacity(n);
    for i in 0..100 {
        close.push(100.0 + 2.0 * i as f64);
    }
    for i in 0..100 {
        close.push(298.0 - 2.0 * i as f64);
    }
    let open: Vec<f64> = close.iter().map(|c| c - 0.25).collect();
    let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
    let volume = vec![1000.0; n];
    let view = TableView {
        open: &open,
        high: &high,
        low: &low,
        close: &close,
        volume: &volume,
    };

    let default_signals = strategy.batch(view, &HashMap::new()).unwrap();
    let slow_signals = strategy.batch(view, &overrides).unwrap();

    let first = |v: &[bool]| v.iter().position(|b| *b);
    // A longer ATR period means a slower-converging band and a later flip
    let default_first = first(&default_signals.long_entries).unwrap();
    let slow_first = first(&slow_signals.long_entries).unwrap();
    assert!(slow_first >= default_first);
}

#[test]
fn comments_and_blank_lines_are_invisible() {
    let bare = "x = ta.sma(close, 5)\n";
    let commented = "// header\n\nx = ta.sma(close, 5) // trailing\n\n";
    let a = compile(bare).unwrap();
    let b = compile(commented).unwrap();
    assert_eq!(a.warmup, b.warmup);
    assert_eq!(a.input_schema.len(), b.input_schema.len());
}
