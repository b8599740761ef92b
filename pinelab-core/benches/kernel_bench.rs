//! Criterion benchmarks for Pinelab hot paths.
//!
//! Benchmarks:
//! 1. Indicator kernels over 100k-bar series (EMA, RSI, SuperTrend, MACD)
//! 2. Compiled-strategy batch evaluation
//! 3. The step routine on a magnifier-sized window (the per-sub-bar cost)

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pinelab_core::pine::eval::TableView;
use pinelab_core::pine::compile;
use pinelab_core::ta;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_columns(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let close: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect();
    let open: Vec<f64> = close.iter().map(|c| c - 0.3).collect();
    let high: Vec<f64> = close.iter().map(|c| c + 1.5).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 1.5).collect();
    let volume: Vec<f64> = (0..n).map(|i| 1.0e6 + (i % 500_000) as f64).collect();
    (open, high, low, close, volume)
}

const BENCH_SCRIPT: &str = "\
fast = ta.ema(close, 12)
slow = ta.ema(close, 26)
longEntry = ta.crossover(fast, slow)
longExit = ta.crossunder(fast, slow)
if longEntry
    strategy.entry(\"Long\", strategy.long)
if longExit
    strategy.close(\"Long\")
";

// ── Kernels ──────────────────────────────────────────────────────────

fn bench_kernels(c: &mut Criterion) {
    let (_, high, low, close, _) = make_columns(100_000);

    let mut group = c.benchmark_group("kernels_100k");
    group.bench_function("ema_20", |b| {
        b.iter(|| black_box(ta::ema(black_box(&close), 20)))
    });
    group.bench_function("rsi_14", |b| {
        b.iter(|| black_box(ta::rsi(black_box(&close), 14)))
    });
    group.bench_function("supertrend_10", |b| {
        b.iter(|| black_box(ta::supertrend(&high, &low, &close, 3.0, 10)))
    });
    group.bench_function("macd_12_26_9", |b| {
        b.iter(|| black_box(ta::macd(black_box(&close), 12, 26, 9)))
    });
    group.finish();
}

// ── Batch evaluation ─────────────────────────────────────────────────

fn bench_batch(c: &mut Criterion) {
    let strategy = compile(BENCH_SCRIPT).unwrap();
    let params = HashMap::new();

    let mut group = c.benchmark_group("batch");
    for n in [1_000usize, 10_000, 100_000] {
        let (open, high, low, close, volume) = make_columns(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let view = TableView {
                    open: &open,
                    high: &high,
                    low: &low,
                    close: &close,
                    volume: &volume,
                };
                black_box(strategy.batch(view, &params).unwrap())
            })
        });
    }
    group.finish();
}

// ── Step on a magnifier window ───────────────────────────────────────

fn bench_step_window(c: &mut Criterion) {
    let strategy = compile(BENCH_SCRIPT).unwrap();
    let params = HashMap::new();

    // 3x warmup completed rows plus the forming row
    let window = strategy.warmup * 3 + 1;
    let (open, high, low, close, volume) = make_columns(window);

    c.bench_function("step_window", |b| {
        b.iter(|| {
            black_box(
                strategy
                    .step(&open, &high, &low, &close, &volume, &params)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_kernels, bench_batch, bench_step_window);
criterion_main!(benches);
