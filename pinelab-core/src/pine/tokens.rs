//! Tokenizer for builder-generated strategy scripts.
//!
//! Handles `//` comment stripping (string-aware), continuation-line joining
//! for unbalanced parentheses/brackets, indentation-based INDENT/DEDENT,
//! and the full token set the builder output uses. Lexing never fails:
//! unrecognized characters are skipped.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Number,
    Str,

    // Identifiers & keywords
    Ident,
    Keyword, // if, and, or, not, true, false, na, strategy

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Assign,

    // Operators: + - * / % > < >= <= == !=
    Op,

    // Structure
    Newline,
    Indent,
    Dedent,
    Eof,
}

const KEYWORDS: [&str; 8] = ["if", "and", "or", "not", "true", "false", "na", "strategy"];

const TWO_CHAR_OPS: [&str; 4] = [">=", "<=", "==", "!="];
const SINGLE_CHAR_OPS: &str = "+-*/%><";

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based line number in the original source (0 for synthetic tokens).
    pub line: u32,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?}, L{})", self.kind, self.lexeme, self.line)
    }
}

/// Convert source text into a flat token stream.
pub fn tokenize(source: &str) -> Vec<Token> {
    let lines = preprocess(source);
    let mut tokens = Vec::new();
    let mut indent_stack: Vec<usize> = vec![0];

    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }

        let stripped = line.trim_start_matches(' ');
        let indent = line.len() - stripped.len();

        if indent > *indent_stack.last().unwrap() {
            indent_stack.push(indent);
            tokens.push(Token::new(TokenKind::Indent, "", line_no));
        }
        while indent < *indent_stack.last().unwrap() {
            indent_stack.pop();
            tokens.push(Token::new(TokenKind::Dedent, "", line_no));
        }

        tokenize_line(stripped, line_no, &mut tokens);
        tokens.push(Token::new(TokenKind::Newline, "\\n", line_no));
    }

    while indent_stack.len() > 1 {
        indent_stack.pop();
        tokens.push(Token::new(TokenKind::Dedent, "", 0));
    }
    tokens.push(Token::new(TokenKind::Eof, "", 0));
    tokens
}

/// Strip comments and join continuation lines.
///
/// A line leaving the running paren/bracket depth above zero continues onto
/// the next physical line; the join collapses the break to a single space.
/// Returns `(line_number, content)` pairs, line numbers pointing at the
/// first physical line of each logical line.
fn preprocess(source: &str) -> Vec<(u32, String)> {
    let mut processed: Vec<(u32, String)> = Vec::new();
    let mut paren_depth: i32 = 0;
    let mut bracket_depth: i32 = 0;
    let mut accum = String::new();
    let mut accum_start: u32 = 0;

    for (i, raw_line) in source.split('\n').enumerate() {
        let line_no = i as u32 + 1;
        let line = strip_comment(raw_line);

        if paren_depth > 0 || bracket_depth > 0 {
            accum.push(' ');
            accum.push_str(line.trim());
        } else {
            if !accum.is_empty() {
                processed.push((accum_start, std::mem::take(&mut accum)));
            }
            accum = line.trim_end().to_string();
            accum_start = line_no;
        }

        for ch in line.chars() {
            match ch {
                '(' => paren_depth += 1,
                ')' => paren_depth = (paren_depth - 1).max(0),
                '[' => bracket_depth += 1,
                ']' => bracket_depth = (bracket_depth - 1).max(0),
                _ => {}
            }
        }
    }

    if !accum.is_empty() {
        processed.push((accum_start, accum));
    }
    processed
}

/// Remove a `//` comment, preserving `//` inside double-quoted strings.
fn strip_comment(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut in_string = false;
    for i in 0..chars.len() {
        if chars[i] == '"' && (i == 0 || chars[i - 1] != '\\') {
            in_string = !in_string;
        } else if chars[i] == '/' && !in_string && i + 1 < chars.len() && chars[i + 1] == '/' {
            return chars[..i].iter().collect();
        }
    }
    line.to_string()
}

fn tokenize_line(text: &str, line_no: u32, tokens: &mut Vec<Token>) {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut i = 0;

    while i < n {
        let ch = chars[i];

        if ch == ' ' || ch == '\t' {
            i += 1;
            continue;
        }

        // String literal: " delimited, backslash escapes the next char
        if ch == '"' {
            let mut j = i + 1;
            while j < n && chars[j] != '"' {
                if chars[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            let content: String = chars[i + 1..j.min(n)].iter().collect();
            tokens.push(Token::new(TokenKind::Str, content, line_no));
            i = (j + 1).min(n + 1);
            continue;
        }

        // Number: digits with at most one dot, or a leading dot before a digit
        if ch.is_ascii_digit() || (ch == '.' && i + 1 < n && chars[i + 1].is_ascii_digit()) {
            let mut j = i;
            let mut has_dot = false;
            while j < n && (chars[j].is_ascii_digit() || chars[j] == '.') {
                if chars[j] == '.' {
                    if has_dot {
                        break;
                    }
                    has_dot = true;
                }
                j += 1;
            }
            let lexeme: String = chars[i..j].iter().collect();
            tokens.push(Token::new(TokenKind::Number, lexeme, line_no));
            i = j;
            continue;
        }

        // Two-char operators before single-char
        if i + 1 < n {
            let pair: String = chars[i..i + 2].iter().collect();
            if TWO_CHAR_OPS.contains(&pair.as_str()) {
                tokens.push(Token::new(TokenKind::Op, pair, line_no));
                i += 2;
                continue;
            }
        }

        if SINGLE_CHAR_OPS.contains(ch) {
            tokens.push(Token::new(TokenKind::Op, ch, line_no));
            i += 1;
            continue;
        }

        let kind = match ch {
            '=' => Some(TokenKind::Assign),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = kind {
            tokens.push(Token::new(kind, ch, line_no));
            i += 1;
            continue;
        }

        // Identifier / keyword
        if ch.is_ascii_alphabetic() || ch == '_' {
            let mut j = i;
            while j < n && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let word: String = chars[i..j].iter().collect();
            let kind = if KEYWORDS.contains(&word.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            tokens.push(Token::new(kind, word, line_no));
            i = j;
            continue;
        }

        // Unknown character: skip
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_is_just_eof() {
        let tokens = tokenize("");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
    }

    #[test]
    fn simple_assignment() {
        let tokens = tokenize("x = 5");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_win() {
        let tokens = tokenize("a >= b == c");
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Op)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(ops, vec![">=", "=="]);
    }

    #[test]
    fn comment_stripped_outside_strings() {
        let tokens = tokenize("x = 1 // trailing note");
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Number).count(), 1);
    }

    #[test]
    fn comment_preserved_inside_string() {
        let tokens = tokenize("s = \"http://example\"");
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.lexeme, "http://example");
    }

    #[test]
    fn keywords_tagged() {
        let tokens = tokenize("if cond and not other");
        let kw: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Keyword)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(kw, vec!["if", "and", "not"]);
    }

    #[test]
    fn indent_dedent_balance() {
        let src = "if cond\n    strategy.entry(\"L\", strategy.long)\nx = 1\n";
        let tokens = tokenize(src);
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn dangling_indent_closed_before_eof() {
        let src = "if cond\n    strategy.close(\"L\")";
        let tokens = tokenize(src);
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn continuation_lines_joined() {
        let src = "x = ta.sma(close,\n    14)\ny = 2\n";
        let tokens = tokenize(src);
        // No Indent should appear: the indented physical line is a continuation
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Indent));
        // Both assignments present
        let idents: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert!(idents.contains(&"x"));
        assert!(idents.contains(&"y"));
    }

    #[test]
    fn numbers_integer_and_float() {
        let tokens = tokenize("a = 14 + 3.5 + .25");
        let nums: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(nums, vec!["14", "3.5", ".25"]);
    }

    #[test]
    fn string_escape_consumed() {
        let tokens = tokenize(r#"s = "a\"b""#);
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.lexeme, r#"a\"b"#);
    }

    #[test]
    fn unknown_characters_skipped() {
        let tokens = tokenize("x = 1 @ # $");
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Number).count(), 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn line_numbers_point_at_source_lines() {
        let src = "a = 1\n\nb = 2\n";
        let tokens = tokenize(src);
        let b = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident && t.lexeme == "b")
            .unwrap();
        assert_eq!(b.line, 3);
    }
}
