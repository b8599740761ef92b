//! Magnifier engine integration: resolution choice, warmup gating,
//! monotone position state, intrabar signal placement, progress and
//! cancellation.

use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use pinelab_core::data::{synthetic_1m, InMemorySource};
use pinelab_core::domain::{OhlcvFrame, Timeframe};
use pinelab_core::engine::{
    Backtester, CancelToken, EngineError, EngineRequest, MagnifierBackend, NoProgress,
    ProgressSink, RunMode,
};
use pinelab_core::pine::{compile, SignalVectors};

/// Collects progress updates for assertions.
#[derive(Default)]
struct RecordingProgress {
    updates: Mutex<Vec<(u8, String)>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, pct: u8, message: &str) {
        self.updates.lock().unwrap().push((pct, message.to_string()));
    }
}

const EMA_CROSS_SCRIPT: &str = "\
fast = ta.ema(close, 5)
slow = ta.ema(close, 12)
longEntry = ta.crossover(fast, slow)
longExit = ta.crossunder(fast, slow)
shortEntry = ta.crossunder(fast, slow)
shortExit = ta.crossover(fast, slow)
if longEntry
    strategy.entry(\"Long\", strategy.long)
if longExit
    strategy.close(\"Long\")
if shortEntry
    strategy.entry(\"Short\", strategy.short)
if shortExit
    strategy.close(\"Short position\")
";

fn run_magnified(
    script: &str,
    df_1m: OhlcvFrame,
    timeframe: Timeframe,
    backend: MagnifierBackend,
) -> pinelab_core::engine::EngineOutput {
    let strategy = compile(script).unwrap();
    let source = InMemorySource::new(df_1m);
    let backtester = Backtester::new(&source);
    let mut request = EngineRequest::new("SPY", timeframe);
    request.backend = backend;
    backtester
        .run(&strategy, &request, &NoProgress, &CancelToken::new())
        .unwrap()
}

fn start() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}

#[test]
fn magnifier_uses_5m_resolution_for_1h_chart() {
    let df_1m = synthetic_1m(8_000, 3, start());
    let output = run_magnified(EMA_CROSS_SCRIPT, df_1m, Timeframe::H1, MagnifierBackend::Step);
    assert_eq!(output.mode, RunMode::Magnifier);
    assert_eq!(output.signal_timeframe, Timeframe::M5);
}

#[test]
fn one_minute_chart_falls_back_to_standard() {
    let df_1m = synthetic_1m(500, 3, start());
    let output = run_magnified(EMA_CROSS_SCRIPT, df_1m, Timeframe::M1, MagnifierBackend::Step);
    assert_eq!(output.mode, RunMode::Standard);
    assert_eq!(output.signal_timeframe, Timeframe::M1);
}

#[test]
fn no_signal_before_warmup() {
    let strategy = compile(EMA_CROSS_SCRIPT).unwrap();
    let df_1m = synthetic_1m(8_000, 9, start());
    let output = run_magnified(EMA_CROSS_SCRIPT, df_1m, Timeframe::H1, MagnifierBackend::Step);

    // warmup chart bars at 1h = warmup hours from the first chart bar
    let warmup_cutoff = output.chart.timestamps[strategy.warmup.min(output.chart.len() - 1)];
    let any_before = output
        .signal_timestamps
        .iter()
        .zip(&output.signals.long_entries)
        .chain(output.signal_timestamps.iter().zip(&output.signals.short_entries))
        .any(|(ts, fired)| *fired && *ts < warmup_cutoff);
    assert!(!any_before, "signal fired before warmup cutoff");
}

/// Reconstruct position state from emitted signals and assert the
/// magnifier's monotone-position contract.
fn assert_monotone_position(signals: &SignalVectors) -> (usize, usize) {
    let mut in_long = false;
    let mut in_short = false;
    let mut entries = 0;
    let mut exits = 0;

    for i in 0..signals.len() {
        let fired = [
            signals.long_entries[i],
            signals.long_exits[i],
            signals.short_entries[i],
            signals.short_exits[i],
        ];
        assert!(
            fired.iter().filter(|b| **b).count() <= 1,
            "multiple signals at {i}"
        );

        if signals.long_entries[i] {
            assert!(!in_long && !in_short, "long entry while positioned at {i}");
            in_long = true;
            entries += 1;
        }
        if signals.long_exits[i] {
            assert!(in_long, "long exit while not long at {i}");
            in_long = false;
            exits += 1;
        }
        if signals.short_entries[i] {
            assert!(!in_long && !in_short, "short entry while positioned at {i}");
            in_short = true;
            entries += 1;
        }
        if signals.short_exits[i] {
            assert!(in_short, "short exit while not short at {i}");
            in_short = false;
            exits += 1;
        }
        assert!(!(in_long && in_short));
    }
    (entries, exits)
}

#[test]
fn magnifier_positions_are_monotone() {
    let df_1m = synthetic_1m(12_000, 21, start());
    let output = run_magnified(EMA_CROSS_SCRIPT, df_1m, Timeframe::H1, MagnifierBackend::Step);
    let (entries, _) = assert_monotone_position(&output.signals);
    assert!(entries > 0, "expected the EMA cross to trade at least once");
}

#[test]
fn step_and_batch_backends_agree() {
    let df_1m = synthetic_1m(8_000, 33, start());
    let step = run_magnified(
        EMA_CROSS_SCRIPT,
        df_1m.clone(),
        Timeframe::H1,
        MagnifierBackend::Step,
    );
    let batch = run_magnified(
        EMA_CROSS_SCRIPT,
        df_1m,
        Timeframe::H1,
        MagnifierBackend::BatchOnWindow,
    );
    assert_eq!(step.signals, batch.signals);
}

/// A strategy whose condition completes only when the forming bar holds
/// the full chart bar's volume: its magnifier signal must land on the
/// sub-bar covering the chart bar close, and on no earlier sub-bar.
#[test]
fn close_evaluated_signal_lands_on_final_sub_bar() {
    // Constant volume 1.0 per 1m bar: a full 1h bar carries volume 60,
    // and the forming bar reaches 60 only on its last 5m sub-bar.
    let n = 4_000;
    let mut df_1m = OhlcvFrame::with_capacity(n);
    for i in 0..n {
        let ts = start() + chrono::Duration::minutes(i as i64);
        df_1m.push(ts, 100.0, 101.0, 99.0, 100.0, 1.0);
    }

    let script = "\
fullBar = volume >= 60
if fullBar
    strategy.entry(\"Long\", strategy.long)
";
    let strategy = compile(script).unwrap();
    assert_eq!(strategy.warmup, 50);

    let output = run_magnified(script, df_1m, Timeframe::H1, MagnifierBackend::Step);

    let entries: Vec<usize> = output
        .signals
        .long_entries
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.then_some(i))
        .collect();

    // Only one entry ever (no exit signal to release the position)
    assert_eq!(entries.len(), 1);

    // It must fall on the last 5m sub-bar of the first post-warmup hour:
    // hour index 50, minute 55.
    let expected_ts = start() + chrono::Duration::minutes(50 * 60 + 55);
    assert_eq!(output.signal_timestamps[entries[0]], expected_ts);
}

#[test]
fn progress_is_monotone_and_bounded() {
    let df_1m = synthetic_1m(8_000, 5, start());
    let strategy = compile(EMA_CROSS_SCRIPT).unwrap();
    let source = InMemorySource::new(df_1m);
    let backtester = Backtester::new(&source);
    let request = EngineRequest::new("SPY", Timeframe::H1);

    let progress = RecordingProgress::default();
    backtester
        .run(&strategy, &request, &progress, &CancelToken::new())
        .unwrap();

    let updates = progress.updates.lock().unwrap();
    assert!(!updates.is_empty());
    let mut last = 0u8;
    for (pct, _) in updates.iter() {
        assert!(*pct >= last, "progress went backwards: {last} -> {pct}");
        assert!(*pct <= 100);
        last = *pct;
    }
    // The magnifier loop reports repeatedly between 20 and 88
    assert!(updates.iter().filter(|(p, _)| (20..=88).contains(p)).count() >= 2);
}

#[test]
fn cancellation_returns_cancelled() {
    let df_1m = synthetic_1m(8_000, 5, start());
    let strategy = compile(EMA_CROSS_SCRIPT).unwrap();
    let source = InMemorySource::new(df_1m);
    let backtester = Backtester::new(&source);
    let request = EngineRequest::new("SPY", Timeframe::H1);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = backtester
        .run(&strategy, &request, &NoProgress, &cancel)
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(err.is_cancelled());
}

#[test]
fn magnifier_signal_vectors_are_on_magnifier_timeline() {
    let df_1m = synthetic_1m(8_000, 13, start());
    let n_1m = df_1m.len();
    let output = run_magnified(EMA_CROSS_SCRIPT, df_1m, Timeframe::H1, MagnifierBackend::Step);

    // 5m magnifier: one row per 5 minutes
    assert_eq!(output.signals.len(), n_1m / 5);
    assert_eq!(output.signal_timestamps.len(), output.signals.len());
    assert_eq!(output.signal_close.len(), output.signals.len());
}
