use crate::errors::{Error, Result};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

/// Element kinds an expression can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
}

/// A type tag: a scalar kind, or an array of one. Arrays of arrays cannot
/// be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl ScalarType {
    pub const ALL: [ScalarType; 5] = [
        ScalarType::String,
        ScalarType::Integer,
        ScalarType::Number,
        ScalarType::Boolean,
        ScalarType::Object,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            ScalarType::String => &["str", "string"],
            ScalarType::Integer => &["int", "integer"],
            ScalarType::Number => &["num", "number"],
            ScalarType::Boolean => &["bool", "boolean"],
            ScalarType::Object => &["obj", "object"],
        }
    }

    fn name(self) -> &'static str {
        self.aliases()[1]
    }
}

impl Type {
    pub const STRING: Type = Type::Scalar(ScalarType::String);
    pub const INTEGER: Type = Type::Scalar(ScalarType::Integer);
    pub const NUMBER: Type = Type::Scalar(ScalarType::Number);
    pub const BOOLEAN: Type = Type::Scalar(ScalarType::Boolean);
    pub const OBJECT: Type = Type::Scalar(ScalarType::Object);

    /// Match a type word against the alias table, ignoring ASCII case.
    pub fn parse(word: &str) -> Option<Type> {
        let (base, array) = match word.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (word, false),
        };
        let scalar = ScalarType::ALL.into_iter().find(|t| {
            t.aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(base))
        })?;
        Some(if array {
            Type::Array(scalar)
        } else {
            Type::Scalar(scalar)
        })
    }

    pub fn is_array(self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// The scalar kind, for both scalar and array tags.
    pub fn element(self) -> ScalarType {
        match self {
            Type::Scalar(t) | Type::Array(t) => t,
        }
    }

    /// Every tag in the closed set.
    pub fn all() -> impl Iterator<Item = Type> {
        ScalarType::ALL
            .into_iter()
            .map(Type::Scalar)
            .chain(ScalarType::ALL.into_iter().map(Type::Array))
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(t) => write!(f, "{t}"),
            Type::Array(t) => write!(f, "{t}[]"),
        }
    }
}

/// Coerce `value` to `ty`. Array tags wrap a non-array value into a single
/// element array and cast every element. `Null` stays `Null`.
pub fn cast(value: &Value, ty: Type) -> Result<Value> {
    match ty {
        Type::Scalar(t) => cast_scalar(value, t),
        Type::Array(t) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| cast_scalar(item, t))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(Value::Array(vec![cast_scalar(other, t)?])),
        },
    }
}

pub fn cast_scalar(value: &Value, ty: ScalarType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        ScalarType::String => Ok(Value::String(stringify(value))),
        ScalarType::Integer => to_integer(value).map(|i| integer_value(&i)),
        ScalarType::Number => to_decimal(value).map(|d| decimal_value(&d)),
        ScalarType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(_) => Ok(Value::Bool(!to_decimal(value)?.is_zero())),
            Value::String(s) => Ok(Value::Bool(s.eq_ignore_ascii_case("true"))),
            other => Err(Error::cast(other, ty)),
        },
        ScalarType::Object => Ok(value.clone()),
    }
}

/// Text form used wherever a value is spliced into a string: strings
/// verbatim, everything else as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Largest count of digits on either side of the decimal point accepted
/// from input. Exponent notation would otherwise let a few bytes of JSON
/// expand into millions of digits.
pub const MAX_DIGITS: i64 = 4096;

/// Parse decimal text, rejecting magnitudes or precisions past
/// [`MAX_DIGITS`].
pub fn parse_decimal(text: &str) -> Option<BigDecimal> {
    let d = BigDecimal::from_str(text).ok()?;
    let (_, scale) = d.as_bigint_and_exponent();
    let integer_digits = (d.digits() as i64).saturating_sub(scale);
    (integer_digits <= MAX_DIGITS && scale <= MAX_DIGITS).then_some(d)
}

/// Integral numbers and integer strings parse exactly; fractional numbers
/// round half up.
pub fn to_integer(value: &Value) -> Result<BigInt> {
    match value {
        Value::String(s) => {
            BigInt::from_str(s.trim()).map_err(|_| Error::cast(value, ScalarType::Integer))
        }
        Value::Number(n) => {
            let text = n.to_string();
            if let Ok(i) = BigInt::from_str(&text) {
                return Ok(i);
            }
            parse_decimal(&text)
                .map(|d| round_half_up(&d))
                .ok_or_else(|| Error::cast(value, ScalarType::Integer))
        }
        other => Err(Error::cast(other, ScalarType::Integer)),
    }
}

pub fn to_decimal(value: &Value) -> Result<BigDecimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(Error::cast(other, ScalarType::Number)),
    };
    parse_decimal(&text).ok_or_else(|| Error::cast(value, ScalarType::Number))
}

/// Nearest integer, ties toward positive infinity: `floor(d + 0.5)`.
pub fn round_half_up(d: &BigDecimal) -> BigInt {
    let shifted = d + BigDecimal::new(BigInt::from(5), 1);
    let truncated = shifted.with_scale(0);
    let (whole, _) = truncated.as_bigint_and_exponent();
    if shifted.is_negative() && truncated != shifted {
        whole - 1
    } else {
        whole
    }
}

pub fn integer_value(i: &BigInt) -> Value {
    number_from_text(&i.to_string())
}

pub fn decimal_value(d: &BigDecimal) -> Value {
    number_from_text(&d.to_string())
}

fn number_from_text(text: &str) -> Value {
    serde_json::from_str::<Number>(text)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}
