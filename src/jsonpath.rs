use crate::errors::{Error, Result};
use crate::filter::FilterExpr;
use crate::parser::{ParseError, Parser};
use serde_json::Value;

/// A compiled JSONPath query.
#[derive(Debug, Clone)]
pub struct JsonPath {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
pub enum Segment {
    Root,        // $
    Key(String), // .foo or ['foo']
    Wildcard,    // .* or [*]
    Index(i64),  // [0]
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    }, // [start:end:step]
    Recursive,   // ..
    Filter(Box<FilterExpr>), // [?(expr)]
}

/// Run `path` against `data`.
///
/// A definite path (only keys and non-negative indexes) returns the single
/// matched value or `Null`. Anything else returns an array of every match,
/// which may be empty.
pub fn query(data: &Value, path: &str) -> Result<Value> {
    let compiled = JsonPath::compile(path)?;
    let matches = compiled.select(data);
    if compiled.is_definite() {
        Ok(matches.first().map(|v| (*v).clone()).unwrap_or(Value::Null))
    } else {
        Ok(Value::Array(matches.into_iter().cloned().collect()))
    }
}

impl JsonPath {
    pub fn compile(path: &str) -> Result<Self> {
        let mut p = Parser::new(path);
        parse(&mut p).map_err(|e| Error::Query {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub fn is_definite(&self) -> bool {
        self.segments.iter().all(|seg| match seg {
            Segment::Root | Segment::Key(_) => true,
            Segment::Index(i) => *i >= 0,
            _ => false,
        })
    }

    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        select_segments(root, &self.segments)
    }
}

fn parse(p: &mut Parser) -> std::result::Result<JsonPath, ParseError> {
    p.skip_ws();
    if !p.consume_char('$') {
        return Err(p.error("path must start with `$`"));
    }
    let mut segments = vec![Segment::Root];
    parse_segments(p, &mut segments)?;
    p.skip_ws();
    if !p.eof() {
        return Err(p.error("unexpected character in path"));
    }
    Ok(JsonPath { segments })
}

/// Segments following `$` or `@`. Stops, without consuming it, at the first
/// character that cannot start a segment.
pub(crate) fn parse_segments(
    p: &mut Parser,
    segments: &mut Vec<Segment>,
) -> std::result::Result<(), ParseError> {
    loop {
        p.skip_ws();
        if p.consume_str("..") {
            segments.push(Segment::Recursive);
            if p.consume_char('*') {
                segments.push(Segment::Wildcard);
            } else if p.peek_char() != Some('[') {
                segments.push(Segment::Key(p.parse_identifier()?));
            }
        } else if p.consume_char('.') {
            segments.push(if p.consume_char('*') {
                Segment::Wildcard
            } else {
                Segment::Key(p.parse_identifier()?)
            });
        } else if p.consume_char('[') {
            p.skip_ws();
            segments.push(parse_bracket(p)?);
            p.skip_ws();
            p.expect(']')?;
        } else {
            return Ok(());
        }
    }
}

/// Body of a `[...]` segment, up to but excluding the closing bracket.
fn parse_bracket(p: &mut Parser) -> std::result::Result<Segment, ParseError> {
    if p.consume_char('*') {
        return Ok(Segment::Wildcard);
    }
    if p.consume_char('?') {
        p.skip_ws();
        p.expect('(')?;
        let expr = crate::filter::parse_filter(p)?;
        p.skip_ws();
        p.expect(')')?;
        return Ok(Segment::Filter(Box::new(expr)));
    }
    if matches!(p.peek_char(), Some('\'' | '"')) {
        return Ok(Segment::Key(p.parse_quoted_string()?));
    }
    let content = p.capture_until(']')?;
    parse_bracket_number(p, content)
}

fn parse_bracket_number(p: &Parser, content: &str) -> std::result::Result<Segment, ParseError> {
    if !content.contains(':') {
        let mut tmp = Parser::new(content.trim());
        let idx = tmp.parse_int()?;
        if !tmp.eof() {
            return Err(p.error("bad index"));
        }
        return Ok(Segment::Index(idx));
    }
    let parts: Vec<&str> = content.split(':').collect();
    if parts.len() > 3 {
        return Err(p.error("slice too many components"));
    }
    let parse_opt_i64 = |s: &str| -> std::result::Result<Option<i64>, ParseError> {
        let t = s.trim();
        if t.is_empty() {
            Ok(None)
        } else {
            t.parse::<i64>()
                .map(Some)
                .map_err(|_| p.error("bad slice number"))
        }
    };
    Ok(Segment::Slice {
        start: parse_opt_i64(parts.first().copied().unwrap_or(""))?,
        end: parse_opt_i64(parts.get(1).copied().unwrap_or(""))?,
        step: parse_opt_i64(parts.get(2).copied().unwrap_or(""))?,
    })
}

/// Apply `segments` starting from `root`. `Root` resets the selection to
/// `root`, so relative paths simply omit it.
pub(crate) fn select_segments<'a>(root: &'a Value, segments: &[Segment]) -> Vec<&'a Value> {
    segments.iter().fold(vec![root], |current, seg| {
        if let Segment::Root = seg {
            return vec![root];
        }
        current.into_iter().flat_map(|v| step(v, seg)).collect()
    })
}

fn step<'a>(v: &'a Value, seg: &Segment) -> Vec<&'a Value> {
    match (seg, v) {
        (Segment::Root, _) => vec![v],
        (Segment::Key(k), Value::Object(map)) => map.get(k).into_iter().collect(),
        (Segment::Index(i), Value::Array(arr)) => index_array(arr, *i).into_iter().collect(),
        (Segment::Slice { start, end, step }, Value::Array(arr)) => {
            slice_array(arr, *start, *end, *step)
        }
        (Segment::Wildcard, Value::Array(arr)) => arr.iter().collect(),
        (Segment::Wildcard, Value::Object(map)) => map.values().collect(),
        (Segment::Recursive, _) => {
            let mut out = Vec::new();
            recurse_collect(v, &mut out);
            out
        }
        // Arrays filter their elements; anything else is tested as itself
        (Segment::Filter(expr), Value::Array(arr)) => arr
            .iter()
            .filter(|item| crate::filter::eval_filter(expr, item))
            .collect(),
        (Segment::Filter(expr), _) if crate::filter::eval_filter(expr, v) => vec![v],
        _ => Vec::new(),
    }
}

fn index_array(arr: &[Value], i: i64) -> Option<&Value> {
    let idx = if i < 0 { arr.len() as i64 + i } else { i };
    if idx < 0 {
        None
    } else {
        arr.get(idx as usize)
    }
}

fn slice_array(
    arr: &[Value],
    start: Option<i64>,
    end: Option<i64>,
    step: Option<i64>,
) -> Vec<&Value> {
    let n = arr.len() as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Vec::new();
    }
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (n + i).clamp(0, n)
        } else {
            i.clamp(0, n)
        }
    };
    let lo = norm(start.unwrap_or(0));
    let hi = norm(end.unwrap_or(n));
    let mut out = Vec::new();
    if step > 0 {
        let mut i = lo;
        while i < hi {
            if let Some(v) = arr.get(i as usize) {
                out.push(v);
            }
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        if hi == 0 {
            return out;
        }
        let mut i = (hi - 1).clamp(0, n - 1);
        while i >= lo {
            if let Some(v) = arr.get(i as usize) {
                out.push(v);
            }
            match i.checked_add(step) {
                Some(next) if next >= 0 => i = next,
                _ => break,
            }
        }
    }
    out
}

fn recurse_collect<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(v);
    match v {
        Value::Array(arr) => {
            for elt in arr {
                recurse_collect(elt, out);
            }
        }
        Value::Object(map) => {
            for elt in map.values() {
                recurse_collect(elt, out);
            }
        }
        _ => {}
    }
}
