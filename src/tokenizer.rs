//! Splits the expression part of a schema string into a flat token stream.
//!
//! ```text
//! $.items[*].amount          -> [Path]
//! sum($.items[*].amount)     -> [FunctionStart(sum), Path, FunctionEnd]
//! max(sum($.a), 10, "x y")   -> [FunctionStart(max), FunctionStart(sum), Path,
//!                                FunctionEnd, Raw(10), Raw(x y), FunctionEnd]
//! Hello, @{str $.name}@!     -> [Raw]
//! ```

use crate::errors::{Error, Result};
use crate::evaluator::DEFAULT_MAX_DEPTH;
use crate::parser::{ParseError, Parser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Path(String),
    FunctionStart(String),
    FunctionEnd,
    Raw(String),
}

pub fn tokenize(expression: &str) -> Result<Vec<Token>> {
    tokenize_with_depth(expression, DEFAULT_MAX_DEPTH)
}

/// Like [`tokenize`], failing with [`Error::Schema`] once calls nest deeper
/// than `max_depth`.
pub fn tokenize_with_depth(expression: &str, max_depth: usize) -> Result<Vec<Token>> {
    let trimmed = expression.trim();
    if trimmed.starts_with('$') {
        return Ok(vec![Token::Path(trimmed.to_string())]);
    }
    let Some(name) = call_name(trimmed) else {
        return Ok(vec![Token::Raw(expression.to_string())]);
    };

    let mut p = Parser::new(trimmed);
    let mut out = Vec::new();
    let mut call = Call {
        expression,
        max_depth,
        out: &mut out,
    };
    call.tokenize(&mut p, name, 1)?;
    p.skip_ws();
    if !p.eof() {
        return Err(syntax(expression, p.error("unexpected input after function call")));
    }
    Ok(out)
}

fn syntax(expression: &str, e: ParseError) -> Error {
    Error::Syntax(format!("{e} in `{expression}`"))
}

/// Name of the call `text` starts with: an identifier directly followed by `(`.
fn call_name(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let end = text
        .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .unwrap_or(text.len());
    text[end..].starts_with('(').then(|| &text[..end])
}

struct Call<'e, 'o> {
    expression: &'e str,
    max_depth: usize,
    out: &'o mut Vec<Token>,
}

impl Call<'_, '_> {
    fn tokenize(&mut self, p: &mut Parser, name: &str, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::Schema(format!(
                "calls nested deeper than {} levels in `{}`",
                self.max_depth,
                truncated(self.expression)
            )));
        }
        let expression = self.expression;
        let fail = |e: ParseError| syntax(expression, e);

        p.consume_str(name);
        p.expect('(').map_err(fail)?;
        self.out.push(Token::FunctionStart(name.to_string()));
        loop {
            while p.peek_char().is_some_and(|c| c.is_whitespace() || c == ',') {
                p.bump();
            }
            match p.peek_char() {
                None => return Err(fail(p.error(format!("unterminated call to `{name}`")))),
                Some(')') => {
                    p.bump();
                    self.out.push(Token::FunctionEnd);
                    return Ok(());
                }
                Some('$') => {
                    let path = scan_argument(p).map_err(fail)?;
                    self.out.push(Token::Path(path.to_string()));
                }
                Some('"') | Some('\'') => {
                    let text = p.parse_quoted_string().map_err(fail)?;
                    self.out.push(Token::Raw(text));
                }
                Some(_) => match call_name(p.rest()) {
                    Some(inner) => self.tokenize(p, inner, depth + 1)?,
                    None => {
                        let text = scan_argument(p).map_err(fail)?;
                        self.out.push(Token::Raw(text.to_string()));
                    }
                },
            }
        }
    }
}

/// Head of a possibly huge expression, for error messages.
fn truncated(expression: &str) -> &str {
    match expression.char_indices().nth(40) {
        Some((end, _)) => &expression[..end],
        None => expression,
    }
}

/// One unquoted argument: runs until whitespace, `,` or the closing `)` of
/// the call, skipping over bracketed and quoted regions.
fn scan_argument<'a>(p: &mut Parser<'a>) -> std::result::Result<&'a str, ParseError> {
    let start = p.position();
    let mut depth = 0usize;
    while let Some(c) = p.peek_char() {
        match c {
            '\'' | '"' => {
                p.parse_quoted_string()?;
                continue;
            }
            '[' | '(' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ')' if depth == 0 => break,
            ')' => depth -= 1,
            ',' if depth == 0 => break,
            c if c.is_whitespace() && depth == 0 => break,
            _ => {}
        }
        p.bump();
    }
    if depth > 0 {
        return Err(p.error("unbalanced brackets in argument"));
    }
    Ok(p.slice_from(start))
}
