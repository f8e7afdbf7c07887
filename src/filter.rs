//! `[?( ... )]` predicates.
//!
//! ```text
//! filter  := or
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | "(" or ")" | operand (cmp operand)?
//! operand := @<segments> | literal | lower(operand) | upper(operand) | length(operand)
//! ```

use crate::comparison::{self, compare};
use crate::jsonpath::{self, Segment};
use crate::parser::{ParseError, Parser};
use num_traits::Zero;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub enum FilterExpr {
    Compare(CmpOp, Operand, Operand),
    All(Vec<FilterExpr>),
    Any(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// Bare operand, tested for truthiness.
    Test(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

// Longest symbols first so `<=` is not read as `<`.
const OPERATORS: [(&str, CmpOp); 6] = [
    ("==", CmpOp::Eq),
    ("!=", CmpOp::Ne),
    ("<=", CmpOp::Le),
    (">=", CmpOp::Ge),
    ("<", CmpOp::Lt),
    (">", CmpOp::Gt),
];

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::Ne => ord.is_ne(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Le => ord.is_le(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Ge => ord.is_ge(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFn {
    Lower,
    Upper,
    Length,
}

#[derive(Debug, Clone)]
pub enum Operand {
    /// Path relative to the element under test: `@.a['b'][0]`.
    Current(Vec<Segment>),
    Literal(Value),
    Apply(TextFn, Box<Operand>),
}

pub fn parse_filter(p: &mut Parser) -> Result<FilterExpr, ParseError> {
    p.nested(parse_or)
}

fn parse_or(p: &mut Parser) -> Result<FilterExpr, ParseError> {
    let mut alternatives = vec![parse_and(p)?];
    loop {
        p.skip_ws();
        if !p.consume_str("||") {
            break;
        }
        alternatives.push(parse_and(p)?);
    }
    Ok(collapse(alternatives, FilterExpr::Any))
}

fn parse_and(p: &mut Parser) -> Result<FilterExpr, ParseError> {
    let mut terms = vec![parse_unary(p)?];
    loop {
        p.skip_ws();
        if !p.consume_str("&&") {
            break;
        }
        terms.push(parse_unary(p)?);
    }
    Ok(collapse(terms, FilterExpr::All))
}

fn collapse(mut exprs: Vec<FilterExpr>, join: fn(Vec<FilterExpr>) -> FilterExpr) -> FilterExpr {
    if exprs.len() == 1 {
        exprs.remove(0)
    } else {
        join(exprs)
    }
}

fn parse_unary(p: &mut Parser) -> Result<FilterExpr, ParseError> {
    p.skip_ws();
    // `!=` never starts an operand, so a leading `!` is negation
    if p.consume_char('!') {
        let inner = p.nested(parse_unary)?;
        return Ok(FilterExpr::Not(Box::new(inner)));
    }
    if p.consume_char('(') {
        let inner = parse_filter(p)?;
        p.skip_ws();
        p.expect(')')?;
        return Ok(inner);
    }
    let left = parse_operand(p)?;
    p.skip_ws();
    match OPERATORS.iter().find(|(symbol, _)| p.consume_str(symbol)) {
        Some(&(_, op)) => Ok(FilterExpr::Compare(op, left, parse_operand(p)?)),
        None => Ok(FilterExpr::Test(left)),
    }
}

fn parse_operand(p: &mut Parser) -> Result<Operand, ParseError> {
    p.skip_ws();
    if p.consume_char('@') {
        let mut segments = Vec::new();
        jsonpath::parse_segments(p, &mut segments)?;
        return Ok(Operand::Current(segments));
    }
    if matches!(p.peek_char(), Some('"' | '\'')) {
        return Ok(Operand::Literal(Value::String(p.parse_quoted_string()?)));
    }
    if matches!(p.peek_char(), Some(c) if c == '-' || c.is_ascii_digit()) {
        return Ok(Operand::Literal(p.parse_number_literal()?));
    }

    let word = p.parse_identifier()?;
    let text_fn = match word.as_str() {
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        "null" => return Ok(Operand::Literal(Value::Null)),
        "lower" => TextFn::Lower,
        "upper" => TextFn::Upper,
        "length" => TextFn::Length,
        _ => return Err(p.error(format!("invalid operand `{word}`"))),
    };
    p.skip_ws();
    p.expect('(')?;
    let inner = p.nested(parse_operand)?;
    p.skip_ws();
    p.expect(')')?;
    Ok(Operand::Apply(text_fn, Box::new(inner)))
}

pub fn eval_filter(expr: &FilterExpr, current: &Value) -> bool {
    match expr {
        FilterExpr::Compare(op, a, b) => {
            let (a, b) = (resolve(a, current), resolve(b, current));
            match compare(&a, &b) {
                Some(ord) => op.holds(ord),
                None => *op == CmpOp::Eq && a == b,
            }
        }
        FilterExpr::All(terms) => terms.iter().all(|t| eval_filter(t, current)),
        FilterExpr::Any(terms) => terms.iter().any(|t| eval_filter(t, current)),
        FilterExpr::Not(inner) => !eval_filter(inner, current),
        FilterExpr::Test(op) => truthy(&resolve(op, current)),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => comparison::decimal(n).is_some_and(|d| !d.is_zero()),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn resolve(op: &Operand, current: &Value) -> Value {
    match op {
        Operand::Literal(v) => v.clone(),
        Operand::Current(segments) => jsonpath::select_segments(current, segments)
            .first()
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
        Operand::Apply(f, inner) => {
            let v = resolve(inner, current);
            match (f, v) {
                (TextFn::Lower, Value::String(s)) => Value::String(s.to_lowercase()),
                (TextFn::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
                (TextFn::Length, Value::String(s)) => Value::from(s.chars().count()),
                (TextFn::Length, Value::Array(a)) => Value::from(a.len()),
                (TextFn::Length, Value::Object(m)) => Value::from(m.len()),
                (TextFn::Length, _) => Value::from(0),
                (_, other) => other,
            }
        }
    }
}
