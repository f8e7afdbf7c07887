use super::{Function, ALL_TYPES, ARRAY_TYPES, SCALAR_TYPES};
use crate::errors::{Error, Result};
use crate::types::{self, ScalarType, Type};
use bigdecimal::BigDecimal;
use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::Zero;
use serde_json::Value;
use std::ops::RangeInclusive;
use std::str::FromStr;

const NUMERIC: &[Type] = &[Type::INTEGER, Type::NUMBER];

/// Elements of an aggregate argument. A resolved path is usually an array;
/// a lone value counts as one element and `null` as none. Null elements
/// are dropped.
fn elements(arg: &Value) -> Vec<&Value> {
    match arg {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        other => vec![other],
    }
}

enum Numbers {
    Integers(Vec<BigInt>),
    Decimals(Vec<BigDecimal>),
}

/// Coerce the single argument of an aggregate the way `int[]` / `num[]`
/// would. Untyped (nested) calls stay integral when every element is.
fn numbers(function: &str, target: Option<Type>, arg: &Value) -> Result<Numbers> {
    let items = elements(arg);
    let integral = |v: &Value| -> Option<BigInt> {
        match v {
            Value::String(s) => BigInt::from_str(s.trim()).ok(),
            Value::Number(n) => BigInt::from_str(&n.to_string()).ok(),
            _ => None,
        }
    };
    let wrap = |e: Error| Error::argument(function, e.to_string());
    match target {
        Some(Type::Scalar(ScalarType::Integer)) => items
            .into_iter()
            .map(types::to_integer)
            .collect::<Result<Vec<_>>>()
            .map(Numbers::Integers)
            .map_err(wrap),
        Some(_) => items
            .into_iter()
            .map(types::to_decimal)
            .collect::<Result<Vec<_>>>()
            .map(Numbers::Decimals)
            .map_err(wrap),
        None => match items.iter().map(|v| integral(*v)).collect::<Option<Vec<_>>>() {
            Some(ints) => Ok(Numbers::Integers(ints)),
            None => items
                .into_iter()
                .map(types::to_decimal)
                .collect::<Result<Vec<_>>>()
                .map(Numbers::Decimals)
                .map_err(wrap),
        },
    }
}

pub struct Sum;
impl Function for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }
    fn supported_types(&self) -> &'static [Type] {
        NUMERIC
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match numbers(self.name(), target, &args[0])? {
            Numbers::Integers(v) => {
                types::integer_value(&v.into_iter().fold(BigInt::zero(), |a, b| a + b))
            }
            Numbers::Decimals(v) => {
                types::decimal_value(&v.into_iter().fold(BigDecimal::zero(), |a, b| a + b))
            }
        })
    }
}

pub struct Min;
impl Function for Min {
    fn name(&self) -> &'static str {
        "min"
    }
    fn supported_types(&self) -> &'static [Type] {
        NUMERIC
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match numbers(self.name(), target, &args[0])? {
            Numbers::Integers(v) => v.iter().min().map(types::integer_value),
            Numbers::Decimals(v) => v.iter().min().map(types::decimal_value),
        }
        .unwrap_or(Value::Null))
    }
}

pub struct Max;
impl Function for Max {
    fn name(&self) -> &'static str {
        "max"
    }
    fn supported_types(&self) -> &'static [Type] {
        NUMERIC
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match numbers(self.name(), target, &args[0])? {
            Numbers::Integers(v) => v.iter().max().map(types::integer_value),
            Numbers::Decimals(v) => v.iter().max().map(types::decimal_value),
        }
        .unwrap_or(Value::Null))
    }
}

/// Arithmetic mean. Rounded half up when an integer is asked for.
pub struct Avg;
impl Function for Avg {
    fn name(&self) -> &'static str {
        "avg"
    }
    fn supported_types(&self) -> &'static [Type] {
        NUMERIC
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, target: Option<Type>, args: &[Value]) -> Result<Value> {
        let decimals: Vec<BigDecimal> = match numbers(self.name(), target, &args[0])? {
            Numbers::Integers(v) => v.into_iter().map(BigDecimal::from).collect(),
            Numbers::Decimals(v) => v,
        };
        if decimals.is_empty() {
            return Ok(Value::Null);
        }
        let count = BigDecimal::from(decimals.len() as u64);
        let mean = decimals.into_iter().fold(BigDecimal::zero(), |a, b| a + b) / count;
        Ok(match target {
            Some(Type::Scalar(ScalarType::Integer)) => {
                types::integer_value(&types::round_half_up(&mean))
            }
            _ => types::decimal_value(&mean),
        })
    }
}

pub struct Count;
impl Function for Count {
    fn name(&self) -> &'static str {
        "count"
    }
    fn supported_types(&self) -> &'static [Type] {
        &[Type::INTEGER]
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        let n = match &args[0] {
            Value::Null => 0,
            Value::Array(items) => items.len(),
            _ => 1,
        };
        Ok(Value::from(n as u64))
    }
}

fn map_text(arg: &Value, f: impl Fn(&str) -> String) -> Value {
    match arg {
        Value::Null => Value::Null,
        other => Value::String(f(&types::stringify(other))),
    }
}

pub struct Lower;
impl Function for Lower {
    fn name(&self) -> &'static str {
        "lower"
    }
    fn supported_types(&self) -> &'static [Type] {
        &[Type::STRING]
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(map_text(&args[0], str::to_lowercase))
    }
}

pub struct Upper;
impl Function for Upper {
    fn name(&self) -> &'static str {
        "upper"
    }
    fn supported_types(&self) -> &'static [Type] {
        &[Type::STRING]
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(map_text(&args[0], str::to_uppercase))
    }
}

/// First element of a collection; a scalar is its own first element.
pub struct First;
impl Function for First {
    fn name(&self) -> &'static str {
        "first"
    }
    fn supported_types(&self) -> &'static [Type] {
        SCALAR_TYPES
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Array(a) => a.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        })
    }
}

/// Order-preserving de-duplication.
pub struct Unique;
impl Function for Unique {
    fn name(&self) -> &'static str {
        "unique"
    }
    fn supported_types(&self) -> &'static [Type] {
        ARRAY_TYPES
    }
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Array(a) => Value::Array(
                a.iter()
                    .unique_by(|x| serde_json::to_string(x).unwrap_or_default())
                    .cloned()
                    .collect(),
            ),
            other => other.clone(),
        })
    }
}

/// `or_default(value, fallback)`: the fallback when value is null or an
/// empty collection.
pub struct OrDefault;
impl Function for OrDefault {
    fn name(&self) -> &'static str {
        "or_default"
    }
    fn supported_types(&self) -> &'static [Type] {
        ALL_TYPES
    }
    fn arity(&self) -> RangeInclusive<usize> {
        2..=2
    }
    fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Null => args[1].clone(),
            Value::Array(a) if a.is_empty() => args[1].clone(),
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sum_integers_and_decimals() {
        assert_eq!(
            Sum.invoke(Some(Type::INTEGER), &[json!([1, "2", 3])]).unwrap(),
            json!(6)
        );
        assert_eq!(
            Sum.invoke(Some(Type::NUMBER), &[json!(["1.5", 2.5])])
                .unwrap()
                .to_string(),
            "4.0"
        );
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        assert_eq!(Sum.invoke(Some(Type::INTEGER), &[Value::Null]).unwrap(), json!(0));
        assert_eq!(Sum.invoke(Some(Type::NUMBER), &[json!([])]).unwrap(), json!(0));
    }

    #[test]
    fn untyped_sum_infers_kind() {
        assert_eq!(Sum.invoke(None, &[json!([1, 2])]).unwrap(), json!(3));
        assert_eq!(Sum.invoke(None, &[json!([1, 0.5])]).unwrap().to_string(), "1.5");
    }

    #[test]
    fn sum_rejects_non_numeric_elements() {
        assert!(matches!(
            Sum.invoke(Some(Type::NUMBER), &[json!(["abc"])]),
            Err(Error::Argument { .. })
        ));
    }

    #[test]
    fn min_max_avg() {
        let values = json!([3, 1, 2]);
        assert_eq!(Min.invoke(Some(Type::INTEGER), &[values.clone()]).unwrap(), json!(1));
        assert_eq!(Max.invoke(Some(Type::INTEGER), &[values.clone()]).unwrap(), json!(3));
        assert_eq!(Avg.invoke(Some(Type::INTEGER), &[json!([1, 2])]).unwrap(), json!(2));
        assert_eq!(Avg.invoke(Some(Type::INTEGER), &[json!([-1, -2])]).unwrap(), json!(-1));
        let mean = Avg.invoke(Some(Type::NUMBER), &[json!([1, 2])]).unwrap();
        assert_eq!(
            types::to_decimal(&mean).unwrap(),
            BigDecimal::from_str("1.5").unwrap()
        );
        assert_eq!(Max.invoke(Some(Type::NUMBER), &[json!([])]).unwrap(), Value::Null);
    }

    #[test]
    fn count_values() {
        assert_eq!(Count.invoke(None, &[json!([1, 2, 3])]).unwrap(), json!(3));
        assert_eq!(Count.invoke(None, &[json!("x")]).unwrap(), json!(1));
        assert_eq!(Count.invoke(None, &[Value::Null]).unwrap(), json!(0));
    }

    #[test]
    fn text_and_collection_helpers() {
        assert_eq!(Lower.invoke(None, &[json!("AbC")]).unwrap(), json!("abc"));
        assert_eq!(Upper.invoke(None, &[json!("AbC")]).unwrap(), json!("ABC"));
        assert_eq!(First.invoke(None, &[json!([10, 20])]).unwrap(), json!(10));
        assert_eq!(Unique.invoke(None, &[json!([1, 1, 2, 2, 3])]).unwrap(), json!([1, 2, 3]));
        assert_eq!(
            OrDefault.invoke(None, &[json!([]), json!({"x": 1})]).unwrap(),
            json!({"x": 1})
        );
    }
}
