use crate::types;
use bigdecimal::BigDecimal;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Exact decimal view of a JSON number.
pub fn decimal(n: &Number) -> Option<BigDecimal> {
    types::parse_decimal(&n.to_string())
}

/// Ordering used by filter comparisons. Numbers compare by exact value,
/// numeric strings against numbers by value too, mixed kinds by their JSON
/// text. `None` only for numbers that do not parse as decimals.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        (Value::Number(na), Value::Number(nb)) => Some(decimal(na)?.cmp(&decimal(nb)?)),
        (Value::Bool(ba), Value::Bool(bb)) => Some(ba.cmp(bb)),
        (Value::Number(n), Value::String(s)) => match (decimal(n), types::parse_decimal(s.trim())) {
            (Some(dn), Some(ds)) => Some(dn.cmp(&ds)),
            _ => Some(a.to_string().cmp(&b.to_string())),
        },
        (Value::String(_), Value::Number(_)) => compare(b, a).map(Ordering::reverse),
        _ => Some(a.to_string().cmp(&b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(compare(&json!(1.50), &json!(1.5)), Some(Ordering::Equal));
        assert_eq!(compare(&json!("10"), &json!(9)), Some(Ordering::Greater));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
    }
}
