// src/parser.rs
use serde_json::Value;

/// Low-level scanning failure. Callers map it onto their own error class
/// (`Error::Syntax` for expressions, `Error::Query` for paths).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

/// Deepest nesting of recursive grammar rules a single parse may enter.
pub const MAX_NESTING: usize = 128;

/// Byte cursor over a `&str`, shared by the expression tokenizer and the
/// JSONPath compiler.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0, depth: 0 }
    }

    /// Run a recursive rule one level deeper, failing instead of recursing
    /// past [`MAX_NESTING`].
    pub fn nested<T>(
        &mut self,
        rule: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let out = rule(self);
        self.depth -= 1;
        out
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.i,
        }
    }

    pub fn position(&self) -> usize {
        self.i
    }

    pub fn slice_from(&self, start: usize) -> &'a str {
        &self.s[start..self.i]
    }

    pub fn rest(&self) -> &'a str {
        &self.s[self.i..]
    }

    pub fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == '_' || c == '-' || c.is_ascii_alphanumeric() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn parse_int(&mut self) -> Result<i64, ParseError> {
        let start = self.i;
        if self.peek_char() == Some('-') {
            self.i += 1;
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.i == start || &self.s[start..self.i] == "-" {
            return Err(self.error("expected integer"));
        }
        self.s[start..self.i]
            .parse::<i64>()
            .map_err(|_| self.error("bad integer"))
    }

    /// Numeric literal inside a filter. Kept as the exact source text so
    /// that decimals compare without a float round-trip.
    pub fn parse_number_literal(&mut self) -> Result<Value, ParseError> {
        let start = self.i;
        if self.peek_char() == Some('-') {
            self.i += 1;
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.i += 1;
            } else {
                break;
            }
        }
        let s = &self.s[start..self.i];
        serde_json::from_str::<serde_json::Number>(s)
            .map(Value::Number)
            .map_err(|_| self.error(format!("bad number `{s}`")))
    }

    pub fn parse_quoted_string(&mut self) -> Result<String, ParseError> {
        let quote = self.peek_char().ok_or_else(|| self.error("string expected"))?;
        if quote != '\'' && quote != '"' {
            return Err(self.error("expected quoted string"));
        }
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                if let Some(nc) = self.peek_char() {
                    self.i += nc.len_utf8();
                    match nc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        _ => {
                            out.push('\\');
                            out.push(nc);
                        }
                    }
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        Err(self.error("unterminated string"))
    }

    pub fn capture_until(&mut self, end: char) -> Result<&'a str, ParseError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == end {
                break;
            }
            self.i += c.len_utf8();
        }
        if self.peek_char() != Some(end) {
            return Err(self.error(format!("expected '{end}'")));
        }
        Ok(&self.s[start..self.i])
    }

    pub fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    /// Advances over one character, whatever it is.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.i += c.len_utf8();
        Some(c)
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
