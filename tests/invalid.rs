use json_batch::{self as jb, Error};
use serde_json::json;

#[test]
fn test_type_tag_without_expression() {
    let err = jb::evaluate(&json!("int"), &json!({})).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err}");
}

#[test]
fn test_unknown_type_tag() {
    let err = jb::evaluate(&json!("weird $.x"), &json!({"x": 1})).unwrap_err();
    assert!(matches!(err, Error::UnsupportedTypeTag(ref w) if w == "weird"), "got {err}");
}

#[test]
fn test_array_element_missing_array_path() {
    let err = jb::evaluate(&json!({"xs": [{"v": "int $.v"}]}), &json!({})).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err}");
}

// Slice bounds must be integers; the query engine rejects the path instead
// of silently matching nothing.
#[test]
fn test_invalid_jsonpath_slice_bad_number() {
    let err = jb::evaluate(&json!("int[] $.a[1:x]"), &json!({"a": [0, 1, 2, 3]})).unwrap_err();
    assert!(matches!(err, Error::Query { .. }), "got {err}");
}

#[test]
fn test_unregistered_function() {
    let err = jb::evaluate(&json!("int median($.a)"), &json!({"a": [1]})).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFunction(ref f) if f == "median"), "got {err}");
}

#[test]
fn test_bad_cast_surfaces() {
    let err = jb::evaluate(&json!({"outer": {"n": "num $.s"}}), &json!({"s": "abc"})).unwrap_err();
    assert!(matches!(err, Error::Cast { .. }), "got {err}");
}

#[test]
fn test_type_tag_followed_only_by_whitespace() {
    for schema in ["int   ", "str \t", "  num\n "] {
        let err = jb::evaluate(&json!(schema), &json!({})).unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "{schema:?}: got {err}");
    }
}

#[test]
fn test_deeply_nested_calls_are_rejected() {
    let n = 200_000;
    let schema = format!("int {}$.xs{}", "count(".repeat(n), ")".repeat(n));
    let err = jb::evaluate(&json!(schema), &json!({"xs": [1, 2]})).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err}");
}

#[test]
fn test_deeply_nested_filter_is_rejected() {
    let n = 200_000;
    let schema = format!("int $.a[?({}@.b{})]", "(".repeat(n), ")".repeat(n));
    let err = jb::evaluate(&json!(schema), &json!({"a": [{"b": 1}]})).unwrap_err();
    assert!(matches!(err, Error::Query { .. }), "got {err}");
}

#[test]
fn test_overflowing_slice_step_selects_once() {
    let out = jb::evaluate(&json!("int[] $.a[1::9223372036854775807]"), &json!({"a": [0, 1, 2]}))
        .unwrap();
    assert_eq!(out, json!([1]));
}

#[test]
fn test_huge_exponent_is_a_cast_error() {
    let doc: serde_json::Value = serde_json::from_str(r#"{"x": 1e2000000}"#).unwrap();
    let err = jb::evaluate(&json!("int $.x"), &doc).unwrap_err();
    assert!(matches!(err, Error::Cast { .. }), "got {err}");
}
