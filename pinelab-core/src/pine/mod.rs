//! The strategy-script compiler: tokenizer, parser, lowering, evaluator.
//!
//! `compile()` is the single entry point: source text in, an immutable
//! `CompiledStrategy` out, ready for `batch`/`step` evaluation.

pub mod ast;
pub mod eval;
pub mod lower;
pub mod parser;
pub mod strategy;
pub mod tokens;

use thiserror::Error;

pub use eval::{EvalError, TableView};
pub use lower::CodeGenError;
pub use parser::ParseError;
pub use strategy::{
    CompiledStrategy, InputParam, ParamValue, SignalVectors, StrategySettings,
};

#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("codegen error: {0}")]
    CodeGen(#[from] CodeGenError),
}

/// Compile a strategy script into its executable form.
pub fn compile(source: &str) -> Result<CompiledStrategy, CompileError> {
    let tokens = tokens::tokenize(source);
    let mut program = parser::parse(&tokens)?;
    program.version = scan_version(source);
    let strategy = lower::generate(&program, source)?;
    Ok(strategy)
}

/// Extract the `//@version=N` pragma, which the tokenizer strips as a comment.
fn scan_version(source: &str) -> Option<u32> {
    for line in source.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("//@version=") {
            return rest.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_full_builder_script() {
        let src = "\
//@version=6
strategy(\"RSI Strategy\", initial_capital=10000, commission_value=0.001)
rsiLength = input.int(14, \"RSI Length\", minval=1)
oversold = input.int(30, \"Oversold\")
overbought = input.int(70, \"Overbought\")
rsiValue = ta.rsi(close, rsiLength)
longEntry = ta.crossover(rsiValue, oversold)
longExit = ta.crossunder(rsiValue, overbought)
if longEntry
    strategy.entry(\"Long\", strategy.long)
if longExit
    strategy.close(\"Long\")
";
        let strategy = compile(src).unwrap();
        assert_eq!(strategy.name, "RSI Strategy");
        assert_eq!(strategy.input_schema.len(), 3);
        assert_eq!(strategy.warmup, 210); // 3 * 70
        assert_eq!(strategy.settings.initial_capital, Some(10_000.0));
    }

    #[test]
    fn version_pragma_scanned() {
        assert_eq!(scan_version("//@version=6\nx = 1\n"), Some(6));
        assert_eq!(scan_version("x = 1\n"), None);
    }

    #[test]
    fn parse_error_carries_line() {
        // Tuple target with a number inside is a structural violation
        let err = compile("[a, 2] = ta.macd(close, 12, 26, 9)\n").unwrap_err();
        let CompileError::Parse(parse_err) = err else {
            panic!("expected parse error");
        };
        assert_eq!(parse_err.line, 1);
    }
}
