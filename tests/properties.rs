use json_batch::{types, Context, Error, Evaluator, Type};
use proptest::prelude::*;
use serde_json::{json, Value};

fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        (-1_000_000i64..1_000_000, 1u32..6)
            .prop_map(|(n, scale)| json!(n as f64 / 10f64.powi(scale as i32))),
        "[a-zA-Z0-9 ._-]{0,12}".prop_map(Value::from),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(|xs| json!({ "xs": xs })),
    ]
}

fn tag() -> impl Strategy<Value = Type> {
    prop::sample::select(Type::all().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn missing_path_is_null_for_every_tag(ty in tag(), doc in scalar_value()) {
        let ctx = Context::new(json!({ "present": doc }));
        let out = Evaluator::default()
            .evaluate_expression(&format!("{ty} $.absent.deeper"), &ctx)
            .unwrap();
        prop_assert_eq!(out, Value::Null);
    }

    #[test]
    fn array_tag_wraps_lone_values(ty in tag(), value in scalar_value()) {
        let elementwise = Type::Scalar(ty.element());
        if let Ok(single) = types::cast(&value, elementwise) {
            let wrapped = types::cast(&value, Type::Array(ty.element())).unwrap();
            prop_assert_eq!(wrapped, Value::Array(vec![single]));
        }
    }

    #[test]
    fn casts_are_idempotent(ty in tag(), value in scalar_value()) {
        if let Ok(once) = types::cast(&value, ty) {
            let twice = types::cast(&once, ty).unwrap();
            prop_assert_eq!(twice, once);
        }
    }

    #[test]
    fn text_without_markers_is_unchanged(text in "[a-zA-Z0-9 ,.!}@${()\\[\\]]{0,40}") {
        prop_assume!(!text.contains("@{"));
        let out = Evaluator::default().interpolate(&text, &Context::default()).unwrap();
        prop_assert_eq!(out, text);
    }

    #[test]
    fn nested_calls_terminate(n in 0usize..160) {
        let expression = format!("int {}$.xs{}", "count(".repeat(n), ")".repeat(n));
        let ctx = Context::new(json!({ "xs": [1, 2, 3] }));
        let out = Evaluator::default().evaluate_expression(&expression, &ctx);
        match n {
            0 => prop_assert_eq!(out.unwrap(), json!(1)),
            1 => prop_assert_eq!(out.unwrap(), json!(3)),
            2..=60 => prop_assert_eq!(out.unwrap(), json!(1)),
            61..=69 => prop_assert!(matches!(out, Ok(_) | Err(Error::Schema(_)))),
            _ => prop_assert!(matches!(out, Err(Error::Schema(_)))),
        }
    }
}
