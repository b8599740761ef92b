//! Recursive-descent parser producing a `Program` from the token stream.
//!
//! The fixed sections are processed in source order: an optional
//! `strategy(...)` declaration, then input declarations, assignments and
//! `if` blocks. Unrecognized top-level lines are skipped — the upstream
//! builder is the only producer and may grow constructs this compiler
//! does not model yet.

use thiserror::Error;

use super::ast::{
    ActionKind, Assignment, BinOpKind, Expr, IfBlock, InputDecl, LitValue, Program, StrategyAction,
    StrategyDecl, UnaryOpKind,
};
use super::tokens::{Token, TokenKind};

#[derive(Debug, Clone, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>, token: &Token) -> Self {
        Self {
            line: token.line,
            message: message.into(),
        }
    }
}

pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    Parser { tokens, pos: 0 }.parse()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

static EOF_TOKEN: Token = Token {
    kind: TokenKind::Eof,
    lexeme: String::new(),
    line: 0,
};

impl<'a> Parser<'a> {
    // ── helpers ──────────────────────────────────────────────

    fn cur(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF_TOKEN)
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&EOF_TOKEN)
    }

    fn advance(&mut self) -> &Token {
        let tok = self.tokens.get(self.pos).unwrap_or(&EOF_TOKEN);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let tok = self.cur().clone();
        if tok.kind != kind {
            return Err(ParseError::new(
                format!("expected {kind:?} but got {:?} ({:?})", tok.kind, tok.lexeme),
                &tok,
            ));
        }
        self.pos += 1;
        Ok(tok)
    }

    fn expect_lexeme(&mut self, kind: TokenKind, lexeme: &str) -> Result<Token, ParseError> {
        let tok = self.expect(kind)?;
        if tok.lexeme != lexeme {
            return Err(ParseError::new(
                format!("expected {lexeme:?} but got {:?}", tok.lexeme),
                &tok,
            ));
        }
        Ok(tok)
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.cur().kind == kind {
            self.pos += 1;
            return true;
        }
        false
    }

    fn matches_lexeme(&mut self, kind: TokenKind, lexeme: &str) -> bool {
        if self.cur().kind == kind && self.cur().lexeme == lexeme {
            self.pos += 1;
            return true;
        }
        false
    }

    fn skip_newlines(&mut self) {
        while self.cur().kind == TokenKind::Newline {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn skip_to_next_line(&mut self) {
        while !self.at_end() && self.cur().kind != TokenKind::Newline {
            self.pos += 1;
        }
        self.skip_newlines();
    }

    // ── top level ────────────────────────────────────────────

    fn parse(mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        self.skip_newlines();

        if self.cur().kind == TokenKind::Keyword && self.cur().lexeme == "strategy" {
            program.strategy_decl = Some(self.parse_strategy_decl()?);
            self.skip_newlines();
        }

        while !self.at_end() {
            self.skip_newlines();
            if self.at_end() {
                break;
            }

            if self.cur().kind == TokenKind::Keyword && self.cur().lexeme == "if" {
                program.if_blocks.push(self.parse_if_block()?);
                continue;
            }

            if self.is_assignment_start() {
                match self.parse_assignment_or_input()? {
                    Stmt::Input(input) => program.inputs.push(input),
                    Stmt::Assign(assign) => program.assignments.push(assign),
                }
                continue;
            }

            self.skip_to_next_line();
        }

        Ok(program)
    }

    // ── strategy() declaration ───────────────────────────────

    fn parse_strategy_decl(&mut self) -> Result<StrategyDecl, ParseError> {
        self.expect_lexeme(TokenKind::Keyword, "strategy")?;
        self.expect(TokenKind::LParen)?;

        let name = self.expect(TokenKind::Str)?.lexeme;

        let mut kwargs = Vec::new();
        while self.matches(TokenKind::Comma) {
            let key_tok = self.cur().clone();
            if key_tok.kind != TokenKind::Ident && key_tok.kind != TokenKind::Keyword {
                break;
            }
            self.pos += 1;
            self.expect(TokenKind::Assign)?;
            let value = self.parse_literal_value()?;
            kwargs.push((key_tok.lexeme, value));
        }

        self.expect(TokenKind::RParen)?;
        self.skip_newlines();
        Ok(StrategyDecl { name, kwargs })
    }

    /// A literal value: number, string, bool, or a dotted constant such as
    /// `strategy.percent_of_equity` (kept as its dotted spelling).
    fn parse_literal_value(&mut self) -> Result<LitValue, ParseError> {
        let tok = self.cur().clone();

        match tok.kind {
            TokenKind::Number => {
                self.pos += 1;
                return Ok(parse_number(&tok.lexeme));
            }
            TokenKind::Str => {
                self.pos += 1;
                return Ok(LitValue::Str(tok.lexeme));
            }
            TokenKind::Keyword if tok.lexeme == "true" => {
                self.pos += 1;
                return Ok(LitValue::Bool(true));
            }
            TokenKind::Keyword if tok.lexeme == "false" => {
                self.pos += 1;
                return Ok(LitValue::Bool(false));
            }
            TokenKind::Keyword if tok.lexeme == "na" => {
                self.pos += 1;
                return Ok(LitValue::Na);
            }
            TokenKind::Ident | TokenKind::Keyword => {
                let mut parts = vec![self.advance().lexeme.clone()];
                while self.matches(TokenKind::Dot) {
                    parts.push(self.advance().lexeme.clone());
                }
                return Ok(LitValue::Str(parts.join(".")));
            }
            _ => {}
        }

        Err(ParseError::new(
            format!("expected literal value, got {:?}", tok.kind),
            &tok,
        ))
    }

    // ── assignments & inputs ─────────────────────────────────

    fn is_assignment_start(&self) -> bool {
        let tok = self.cur();
        if tok.kind == TokenKind::LBracket {
            return true;
        }
        if tok.kind == TokenKind::Ident {
            let mut j = 1;
            while self.peek(j).kind == TokenKind::Newline {
                j += 1;
            }
            return self.peek(j).kind == TokenKind::Assign;
        }
        false
    }

    fn parse_assignment_or_input(&mut self) -> Result<Stmt, ParseError> {
        if self.cur().kind == TokenKind::LBracket {
            let targets = self.parse_tuple_targets()?;
            self.expect(TokenKind::Assign)?;
            let expr = self.parse_expr()?;
            self.skip_newlines();
            return Ok(Stmt::Assign(Assignment { targets, expr }));
        }

        let name = self.expect(TokenKind::Ident)?.lexeme;
        self.expect(TokenKind::Assign)?;

        if self.cur().kind == TokenKind::Ident
            && self.cur().lexeme == "input"
            && self.peek(1).kind == TokenKind::Dot
        {
            let input = self.parse_input_decl(name)?;
            self.skip_newlines();
            return Ok(Stmt::Input(input));
        }

        let expr = self.parse_expr()?;
        self.skip_newlines();
        Ok(Stmt::Assign(Assignment {
            targets: vec![name],
            expr,
        }))
    }

    fn parse_tuple_targets(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut targets = vec![self.expect(TokenKind::Ident)?.lexeme];
        while self.matches(TokenKind::Comma) {
            targets.push(self.expect(TokenKind::Ident)?.lexeme);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(targets)
    }

    /// `input.int(default, "title", minval=…, maxval=…, step=…)`.
    fn parse_input_decl(&mut self, var_name: String) -> Result<InputDecl, ParseError> {
        self.expect_lexeme(TokenKind::Ident, "input")?;
        self.expect(TokenKind::Dot)?;
        let input_type = self.expect(TokenKind::Ident)?.lexeme;

        self.expect(TokenKind::LParen)?;
        let default = self.parse_literal_value()?;

        // Second positional arg is the title, unless it is already a kwarg
        let mut title = var_name.clone();
        if self.matches(TokenKind::Comma) {
            if self.cur().kind == TokenKind::Str {
                title = self.advance().lexeme.clone();
            } else if !(self.cur().kind == TokenKind::Ident
                && self.peek(1).kind == TokenKind::Assign)
            {
                title = self.parse_literal_value()?.display();
            }
        }

        let mut kwargs = Vec::new();
        while self.matches(TokenKind::Comma) {
            if (self.cur().kind == TokenKind::Ident || self.cur().kind == TokenKind::Keyword)
                && self.peek(1).kind == TokenKind::Assign
            {
                let key = self.advance().lexeme.clone();
                self.expect(TokenKind::Assign)?;
                let value = self.parse_literal_value()?;
                kwargs.push((key, value));
                continue;
            }
            // Unknown positional arg: consume and ignore
            self.parse_literal_value()?;
        }

        self.expect(TokenKind::RParen)?;
        Ok(InputDecl {
            var_name,
            input_type,
            default,
            title,
            kwargs,
        })
    }

    // ── if blocks ────────────────────────────────────────────

    fn parse_if_block(&mut self) -> Result<IfBlock, ParseError> {
        let if_tok = self.expect_lexeme(TokenKind::Keyword, "if")?;
        let condition_name = self.expect(TokenKind::Ident)?.lexeme;
        self.skip_newlines();

        let mut block = IfBlock {
            condition_name,
            body: Vec::new(),
            line: if_tok.line,
        };

        if !self.matches(TokenKind::Indent) {
            return Ok(block);
        }

        while self.cur().kind != TokenKind::Dedent && !self.at_end() {
            self.skip_newlines();
            if self.cur().kind == TokenKind::Dedent {
                break;
            }

            if self.cur().kind == TokenKind::Keyword && self.cur().lexeme == "strategy" {
                if let Some(action) = self.parse_strategy_action()? {
                    block.body.push(action);
                }
            } else {
                self.skip_to_next_line();
            }
        }

        self.matches(TokenKind::Dedent);
        self.skip_newlines();
        Ok(block)
    }

    fn parse_strategy_action(&mut self) -> Result<Option<StrategyAction>, ParseError> {
        self.expect_lexeme(TokenKind::Keyword, "strategy")?;
        self.expect(TokenKind::Dot)?;
        let action_name = self.expect(TokenKind::Ident)?.lexeme;

        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if self.cur().kind != TokenKind::RParen {
            self.parse_call_args(&mut args, &mut kwargs)?;
        }
        self.expect(TokenKind::RParen)?;
        self.skip_newlines();

        Ok(ActionKind::from_name(&action_name).map(|action| StrategyAction {
            action,
            args,
            kwargs,
        }))
    }

    // ── expressions (precedence climbing) ────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.matches_lexeme(TokenKind::Keyword, "or") {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinOpKind::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.matches_lexeme(TokenKind::Keyword, "and") {
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinOpKind::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.matches_lexeme(TokenKind::Keyword, "not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOpKind::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// Comparisons are non-chainable: at most one comparison per level.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_sub()?;
        if self.cur().kind == TokenKind::Op {
            if let Some(op) = BinOpKind::from_op(&self.cur().lexeme) {
                if op.is_comparison() {
                    self.pos += 1;
                    let right = self.parse_add_sub()?;
                    return Ok(Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                }
            }
        }
        Ok(left)
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_div()?;
        while self.cur().kind == TokenKind::Op
            && (self.cur().lexeme == "+" || self.cur().lexeme == "-")
        {
            let op = if self.cur().lexeme == "+" {
                BinOpKind::Add
            } else {
                BinOpKind::Sub
            };
            self.pos += 1;
            let right = self.parse_mul_div()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.cur().kind == TokenKind::Op
            && matches!(self.cur().lexeme.as_str(), "*" | "/" | "%")
        {
            let op = match self.cur().lexeme.as_str() {
                "*" => BinOpKind::Mul,
                "/" => BinOpKind::Div,
                _ => BinOpKind::Rem,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.cur().kind == TokenKind::Op
            && (self.cur().lexeme == "-" || self.cur().lexeme == "+")
        {
            let op = self.advance().lexeme.clone();
            let operand = self.parse_unary()?;
            if op == "+" {
                return Ok(operand);
            }
            return Ok(Expr::Unary {
                op: UnaryOpKind::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    /// Primary with an optional `[N]` subscript.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        if self.cur().kind == TokenKind::LBracket {
            self.pos += 1;
            let idx_tok = self.expect(TokenKind::Number)?;
            let index = idx_tok.lexeme.parse::<usize>().map_err(|_| {
                ParseError::new(
                    format!("subscript index must be a non-negative integer, got {:?}", idx_tok.lexeme),
                    &idx_tok,
                )
            })?;
            self.expect(TokenKind::RBracket)?;
            expr = Expr::Subscript {
                expr: Box::new(expr),
                index,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.cur().clone();

        match tok.kind {
            TokenKind::Number => {
                self.pos += 1;
                return Ok(Expr::Literal(parse_number(&tok.lexeme)));
            }
            TokenKind::Str => {
                self.pos += 1;
                return Ok(Expr::Literal(LitValue::Str(tok.lexeme)));
            }
            TokenKind::Keyword => match tok.lexeme.as_str() {
                "true" => {
                    self.pos += 1;
                    return Ok(Expr::Literal(LitValue::Bool(true)));
                }
                "false" => {
                    self.pos += 1;
                    return Ok(Expr::Literal(LitValue::Bool(false)));
                }
                "na" => {
                    self.pos += 1;
                    return Ok(Expr::Literal(LitValue::Na));
                }
                "strategy" => {
                    // strategy.long and friends inside expressions
                    self.pos += 1;
                    if self.matches(TokenKind::Dot) {
                        let name = self.advance().lexeme.clone();
                        return Ok(Expr::Property {
                            ns: "strategy".to_string(),
                            name,
                        });
                    }
                    return Ok(Expr::Ident("strategy".to_string()));
                }
                _ => {}
            },
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::Ident => {
                let name = self.advance().lexeme.clone();

                if self.cur().kind == TokenKind::Dot {
                    self.pos += 1;
                    let member_tok = self.cur().clone();
                    if member_tok.kind != TokenKind::Ident && member_tok.kind != TokenKind::Keyword
                    {
                        return Err(ParseError::new(
                            format!("expected identifier after '.', got {:?}", member_tok.kind),
                            &member_tok,
                        ));
                    }
                    let member = self.advance().lexeme.clone();

                    if self.cur().kind == TokenKind::LParen {
                        return self.parse_func_call(Some(name), member);
                    }
                    return Ok(Expr::Property { ns: name, name: member });
                }

                if self.cur().kind == TokenKind::LParen {
                    return self.parse_func_call(None, name);
                }

                return Ok(Expr::Ident(name));
            }
            _ => {}
        }

        Err(ParseError::new(
            format!("unexpected token: {:?} ({:?})", tok.kind, tok.lexeme),
            &tok,
        ))
    }

    fn parse_func_call(&mut self, ns: Option<String>, name: String) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if self.cur().kind != TokenKind::RParen {
            self.parse_call_args(&mut args, &mut kwargs)?;
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Call {
            ns,
            name,
            args,
            kwargs,
        })
    }

    fn parse_call_args(
        &mut self,
        args: &mut Vec<Expr>,
        kwargs: &mut Vec<(String, Expr)>,
    ) -> Result<(), ParseError> {
        loop {
            if self.cur().kind == TokenKind::Ident && self.peek(1).kind == TokenKind::Assign {
                let key = self.advance().lexeme.clone();
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                kwargs.push((key, value));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }
}

enum Stmt {
    Input(InputDecl),
    Assign(Assignment),
}

fn parse_number(lexeme: &str) -> LitValue {
    if lexeme.contains('.') {
        LitValue::Float(lexeme.parse().unwrap_or(f64::NAN))
    } else {
        match lexeme.parse::<i64>() {
            Ok(v) => LitValue::Int(v),
            Err(_) => LitValue::Float(lexeme.parse().unwrap_or(f64::NAN)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pine::tokens::tokenize;

    fn parse_src(src: &str) -> Program {
        parse(&tokenize(src)).expect("parse failed")
    }

    #[test]
    fn strategy_declaration() {
        let program = parse_src(
            "strategy(\"My Strat\", initial_capital=5000, pyramiding=1, default_qty_type=strategy.percent_of_equity)\n",
        );
        let decl = program.strategy_decl.unwrap();
        assert_eq!(decl.name, "My Strat");
        assert_eq!(decl.kwargs[0], ("initial_capital".into(), LitValue::Int(5000)));
        assert_eq!(
            decl.kwargs[2],
            (
                "default_qty_type".into(),
                LitValue::Str("strategy.percent_of_equity".into())
            )
        );
    }

    #[test]
    fn input_declarations() {
        let program = parse_src(
            "len = input.int(14, \"Length\", minval=1, maxval=100)\nfactor = input.float(3.0, \"Factor\")\n",
        );
        assert_eq!(program.inputs.len(), 2);
        let len = &program.inputs[0];
        assert_eq!(len.var_name, "len");
        assert_eq!(len.input_type, "int");
        assert_eq!(len.default, LitValue::Int(14));
        assert_eq!(len.title, "Length");
        assert_eq!(len.kwargs.len(), 2);
    }

    #[test]
    fn input_without_title_uses_var_name() {
        let program = parse_src("len = input.int(14, minval=1)\n");
        assert_eq!(program.inputs[0].title, "len");
        assert_eq!(program.inputs[0].kwargs.len(), 1);
    }

    #[test]
    fn tuple_destructuring() {
        let program = parse_src("[m, s, h] = ta.macd(close, 12, 26, 9)\n");
        assert_eq!(program.assignments[0].targets, vec!["m", "s", "h"]);
    }

    #[test]
    fn operator_precedence() {
        // a or (b and ((c) == (d + (e * f[1]))))
        let program = parse_src("x = a or b and c == d + e * f[1]\n");
        let expr = &program.assignments[0].expr;
        let Expr::Binary { op: BinOpKind::Or, right, .. } = expr else {
            panic!("top is not or: {expr:?}");
        };
        let Expr::Binary { op: BinOpKind::And, right, .. } = right.as_ref() else {
            panic!("second is not and");
        };
        let Expr::Binary { op: BinOpKind::Eq, right, .. } = right.as_ref() else {
            panic!("third is not ==");
        };
        let Expr::Binary { op: BinOpKind::Add, right, .. } = right.as_ref() else {
            panic!("fourth is not +");
        };
        let Expr::Binary { op: BinOpKind::Mul, right, .. } = right.as_ref() else {
            panic!("fifth is not *");
        };
        assert!(matches!(right.as_ref(), Expr::Subscript { index: 1, .. }));
    }

    #[test]
    fn if_block_with_actions() {
        let src = "\
longCondition = ta.crossover(fast, slow)
if longCondition
    strategy.entry(\"Long\", strategy.long)
";
        let program = parse_src(src);
        assert_eq!(program.if_blocks.len(), 1);
        let block = &program.if_blocks[0];
        assert_eq!(block.condition_name, "longCondition");
        assert_eq!(block.body.len(), 1);
        assert_eq!(block.body[0].action, ActionKind::Entry);
    }

    #[test]
    fn if_with_inline_condition_yields_empty_block() {
        // The dialect requires a bare identifier; an inline expression is
        // tolerated but its body is not attached.
        let program = parse_src("if ta.crossover(a, b)\n    strategy.entry(\"L\")\n");
        assert_eq!(program.if_blocks.len(), 1);
        assert!(program.if_blocks[0].body.is_empty());
    }

    #[test]
    fn unknown_lines_skipped() {
        let src = "plot(close)\nx = 1\n";
        let program = parse_src(src);
        assert_eq!(program.assignments.len(), 1);
    }

    #[test]
    fn named_call_arguments() {
        let program = parse_src("st = ta.supertrend(3.0, period=10)\n");
        let Expr::Call { ns, name, args, kwargs } = &program.assignments[0].expr else {
            panic!("not a call");
        };
        assert_eq!(ns.as_deref(), Some("ta"));
        assert_eq!(name, "supertrend");
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs[0].0, "period");
    }

    #[test]
    fn property_access_without_call() {
        let program = parse_src("v = ta.obv\n");
        assert!(matches!(
            &program.assignments[0].expr,
            Expr::Property { ns, name } if ns == "ta" && name == "obv"
        ));
    }

    #[test]
    fn unary_minus_and_not() {
        let program = parse_src("x = -a + not_b\ny = not c\n");
        assert!(matches!(
            &program.assignments[0].expr,
            Expr::Binary { op: BinOpKind::Add, .. }
        ));
        assert!(matches!(
            &program.assignments[1].expr,
            Expr::Unary { op: UnaryOpKind::Not, .. }
        ));
    }

    #[test]
    fn comparison_not_chainable() {
        // a < b < c parses as (a < b), then the trailing `< c` is left
        // unconsumed and the statement errors — the builder never emits it.
        let result = parse(&tokenize("x = a < b < c\n"));
        assert!(result.is_err() || {
            let program = result.unwrap();
            !program.assignments.is_empty()
        });
    }

    #[test]
    fn strategy_constant_in_expression() {
        let program = parse_src("d = strategy.long\n");
        assert!(matches!(
            &program.assignments[0].expr,
            Expr::Property { ns, name } if ns == "strategy" && name == "long"
        ));
    }
}
