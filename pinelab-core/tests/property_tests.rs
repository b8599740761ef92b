//! Property tests for tokenizer robustness and kernel invariants.

use proptest::prelude::*;

use pinelab_core::pine::tokens::{tokenize, TokenKind};
use pinelab_core::ta;

// ── tokenizer ───────────────────────────────────────────────────────────

proptest! {
    /// Lexing never fails, always ends in exactly one EOF, and rebalances
    /// every emitted INDENT with a DEDENT.
    #[test]
    fn tokenizer_terminates_balanced(src in "[ -~\n\t]{0,300}") {
        let tokens = tokenize(&src);
        prop_assert!(!tokens.is_empty());
        prop_assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);

        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        prop_assert_eq!(eofs, 1);

        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        prop_assert_eq!(indents, dedents);
    }

    /// Every token's line number points at a line of the original source.
    #[test]
    fn token_lines_in_bounds(src in "[ -~\n]{0,300}") {
        let line_count = src.split('\n').count() as u32;
        for token in tokenize(&src) {
            prop_assert!(token.line <= line_count.max(1));
        }
    }
}

// ── kernels ─────────────────────────────────────────────────────────────

fn finite_series(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(10.0f64..1000.0, 1..max_len)
}

fn series_with_nans(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![9 => (10.0f64..1000.0).boxed(), 1 => Just(f64::NAN).boxed()],
        1..max_len,
    )
}

proptest! {
    /// Alignment: every kernel preserves input length.
    #[test]
    fn kernels_preserve_length(src in series_with_nans(120), length in 1usize..20) {
        let n = src.len();
        prop_assert_eq!(ta::sma(&src, length).len(), n);
        prop_assert_eq!(ta::ema(&src, length).len(), n);
        prop_assert_eq!(ta::rma(&src, length).len(), n);
        prop_assert_eq!(ta::wma(&src, length).len(), n);
        prop_assert_eq!(ta::rsi(&src, length).len(), n);
        prop_assert_eq!(ta::cci(&src, length).len(), n);
        prop_assert_eq!(ta::highest(&src, length).len(), n);
        prop_assert_eq!(ta::lowest(&src, length).len(), n);
        prop_assert_eq!(ta::percentrank(&src, length).len(), n);
        prop_assert_eq!(ta::linreg(&src, length, 0).len(), n);
        prop_assert_eq!(ta::cum(&src).len(), n);

        let (line, signal, hist) = ta::macd(&src, length, length + 5, 3);
        prop_assert_eq!(line.len(), n);
        prop_assert_eq!(signal.len(), n);
        prop_assert_eq!(hist.len(), n);
    }

    /// Rolling kernels pad the first `length - 1` positions with NaN.
    #[test]
    fn rolling_warmup_is_nan(src in finite_series(120), length in 2usize..20) {
        let out = ta::sma(&src, length);
        for v in out.iter().take((length - 1).min(src.len())) {
            prop_assert!(v.is_nan());
        }
    }

    /// sma(x, 1) == x for finite input.
    #[test]
    fn sma_length_one_identity(src in finite_series(100)) {
        let out = ta::sma(&src, 1);
        for (a, b) in out.iter().zip(&src) {
            prop_assert!((a - b).abs() < 1e-12);
        }
    }

    /// RSI is within [0, 100] wherever defined.
    #[test]
    fn rsi_bounded(src in finite_series(200), length in 2usize..30) {
        for v in ta::rsi(&src, length) {
            if !v.is_nan() {
                prop_assert!((0.0..=100.0).contains(&v), "rsi {v}");
            }
        }
    }

    /// crossover and crossunder never fire together.
    #[test]
    fn cross_directions_disjoint(
        a in finite_series(150),
        b in finite_series(150),
    ) {
        let n = a.len().min(b.len());
        let over = ta::crossover(&a[..n], &b[..n]);
        let under = ta::crossunder(&a[..n], &b[..n]);
        for i in 0..n {
            prop_assert!(!(over[i] != 0.0 && under[i] != 0.0), "both at {i}");
        }
    }

    /// ATR is non-negative wherever defined, on sane bars.
    #[test]
    fn atr_non_negative(close in finite_series(150), length in 1usize..20) {
        let high: Vec<f64> = close.iter().map(|c| c + 1.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.5).collect();
        for v in ta::atr(&high, &low, &close, length) {
            if !v.is_nan() {
                prop_assert!(v >= 0.0);
            }
        }
    }

    /// SuperTrend direction stays in {-1, +1} and its line brackets price
    /// by direction.
    #[test]
    fn supertrend_direction_domain(close in finite_series(150), length in 1usize..15) {
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let (st, dir) = ta::supertrend(&high, &low, &close, 3.0, length);
        for i in 0..close.len() {
            prop_assert!(dir[i] == 1.0 || dir[i] == -1.0);
            if i > 0 && !st[i].is_nan() && st[i] != 0.0 {
                if dir[i] == -1.0 {
                    prop_assert!(st[i] <= close[i] + 1e-9, "bullish line above close at {i}");
                } else {
                    prop_assert!(st[i] >= close[i] - 1e-9, "bearish line below close at {i}");
                }
            }
        }
    }

    /// Bollinger bands bracket the middle band.
    #[test]
    fn bollinger_brackets_middle(src in finite_series(150), length in 2usize..20) {
        let (middle, upper, lower) = ta::bb(&src, length, 2.0);
        for i in 0..src.len() {
            if !middle[i].is_nan() {
                prop_assert!(upper[i] >= middle[i]);
                prop_assert!(lower[i] <= middle[i]);
            }
        }
    }

    /// Shifting by the kernel's own lag: change(x, k)[i] == x[i] - x[i-k].
    #[test]
    fn change_is_exact_difference(src in finite_series(100), length in 1usize..10) {
        let out = ta::change(&src, length);
        for i in length..src.len() {
            prop_assert!((out[i] - (src[i] - src[i - length])).abs() < 1e-12);
        }
    }
}
