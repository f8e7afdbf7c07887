use json_batch::{
    BatchEngine, BatchTemplate, Error, Evaluator, HttpMethod, ReplayDispatcher, Request, Response,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn template(value: Value) -> BatchTemplate {
    serde_json::from_value(value).unwrap()
}

fn response(body: Value) -> Response {
    Response {
        body: Some(body),
        ..Response::default()
    }
}

fn original() -> Request {
    serde_json::from_value(json!({
        "httpMethod": "POST",
        "url": "/batch",
        "headers": {"authorization": ["Bearer t0k"]},
        "body": {"user": "ada", "items": [{"sku": "A", "qty": 2}, {"sku": "B", "qty": 1}]}
    }))
    .unwrap()
}

#[test]
fn test_later_step_reads_earlier_response() {
    let t = template(json!({
        "requests": [
            {"httpMethod": "POST", "url": "/users", "body": {"name": "str $.original.body.user"}},
            {
                "httpMethod": "GET",
                "url": "/users/@{int $.responses[0].body.id}@",
                "body": {"id": "int $.responses[0].body.id"}
            }
        ]
    }));
    let mut engine = BatchEngine::new(
        Evaluator::default(),
        ReplayDispatcher::new([response(json!({"id": 42})), response(json!({"ok": true}))]),
    );
    engine.execute(&original(), &t).unwrap();

    let seen = engine.dispatcher().seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].body, Some(json!({"name": "ada"})));
    assert_eq!(seen[1].url, "/users/42");
    assert_eq!(seen[1].body, Some(json!({"id": 42})));
}

#[test]
fn test_each_step_sees_only_prior_steps() {
    let t = template(json!({
        "requests": [
            {"url": "/a", "body": {"seen": "int count($.responses[*])"}},
            {"url": "/b", "body": {"seen": "int count($.responses[*])"}},
            {"url": "/c", "body": {"seen": "int count($.requests[*])", "prev": "str $.requests[1].url"}}
        ]
    }));
    let mut engine = BatchEngine::new(
        Evaluator::default(),
        ReplayDispatcher::new(vec![Response::default(); 3]),
    );
    engine.execute(&original(), &t).unwrap();
    let bodies: Vec<_> = engine
        .dispatcher()
        .seen()
        .iter()
        .map(|r| r.body.clone().unwrap())
        .collect();
    assert_eq!(
        bodies,
        vec![
            json!({"seen": 0}),
            json!({"seen": 1}),
            json!({"seen": 2, "prev": "/b"})
        ]
    );
}

#[test]
fn test_final_response_template() {
    let t = template(json!({
        "requests": [
            {
                "httpMethod": "PUT",
                "url": "/orders",
                "headers": {"authorization": "str $.original.headers.authorization[0]", "x-sku": "str[] $.original.body.items[*].sku"},
                "body": {
                    "lines": [{"__array_path": "$.original.body.items[*]", "sku": "str $.sku", "qty": "int $.qty"}]
                }
            }
        ],
        "response": {
            "status": 201,
            "headers": {"location": "str /orders/@{str $.responses[0].body.orderId}@"},
            "body": {"order": "str $.responses[0].body.orderId", "units": "int sum($.requests[0].body.lines[*].qty)"}
        }
    }));
    let mut engine = BatchEngine::new(
        Evaluator::default(),
        ReplayDispatcher::new([response(json!({"orderId": "o-9"}))]),
    );
    let out = engine.execute(&original(), &t).unwrap();

    let sent = &engine.dispatcher().seen()[0];
    assert_eq!(sent.http_method, HttpMethod::Put);
    assert_eq!(sent.headers["authorization"], vec!["Bearer t0k".to_string()]);
    assert_eq!(sent.headers["x-sku"], vec!["A".to_string(), "B".to_string()]);
    assert_eq!(
        sent.body,
        Some(json!({"lines": [{"sku": "A", "qty": 2}, {"sku": "B", "qty": 1}]}))
    );

    assert_eq!(out.status, 201);
    assert_eq!(out.headers["location"], vec!["/orders/o-9".to_string()]);
    assert_eq!(out.body, Some(json!({"order": "o-9", "units": 3})));
}

#[test]
fn test_without_response_template_returns_state() {
    let t = template(json!({"requests": [{"url": "/ping"}]}));
    let mut engine = BatchEngine::new(
        Evaluator::default(),
        ReplayDispatcher::new([response(json!("pong"))]),
    );
    let out = engine.execute(&original(), &t).unwrap();
    assert!(out.headers.is_empty());
    let body = out.body.unwrap();
    assert_eq!(body["original"]["url"], json!("/batch"));
    assert_eq!(body["requests"][0]["url"], json!("/ping"));
    assert_eq!(body["requests"][0]["httpMethod"], json!("GET"));
    assert_eq!(body["responses"][0]["body"], json!("pong"));
    assert_eq!(body["responses"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_closure_dispatcher_and_failure_propagation() {
    let t = template(json!({"requests": [{"url": "/ok"}, {"url": "/boom"}, {"url": "/never"}]}));
    let mut calls = Vec::new();
    let dispatcher = |req: &Request| {
        calls.push(req.url.clone());
        if req.url == "/boom" {
            Err(Error::Dispatch {
                method: req.http_method.to_string(),
                url: req.url.clone(),
                message: "connection reset".into(),
            })
        } else {
            Ok(Response::default())
        }
    };
    let mut engine = BatchEngine::new(Evaluator::default(), dispatcher);
    let err = engine.execute(&original(), &t).unwrap_err();
    drop(engine);
    assert!(matches!(err, Error::Dispatch { ref url, .. } if url == "/boom"));
    assert_eq!(calls, vec!["/ok".to_string(), "/boom".to_string()]);
}

#[test]
fn test_evaluation_error_stops_batch() {
    let t = template(json!({"requests": [{"url": "/a", "body": "weird $.x"}, {"url": "/b"}]}));
    let mut engine = BatchEngine::new(Evaluator::default(), ReplayDispatcher::new(vec![Response::default(); 2]));
    assert!(matches!(
        engine.execute(&original(), &t),
        Err(Error::UnsupportedTypeTag(_))
    ));
    assert!(engine.dispatcher().seen().is_empty());
}
