//! Sequential request batches driven by schema templates.
//!
//! Every step sees the original request plus all earlier requests and
//! responses under `$.original`, `$.requests[i]` and `$.responses[i]`.

use crate::context::Context;
use crate::errors::{Error, Result};
use crate::evaluator::Evaluator;
use crate::schema::SchemaNode;
use crate::types;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, error, info, trace, Level};

/// Header name to values, in insertion order.
pub type Headers = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub http_method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: Headers::new(),
            body: None,
        }
    }
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    #[serde(default)]
    pub http_method: HttpMethod,
    /// Interpolated like a `str` expression.
    pub url: String,
    #[serde(default)]
    pub headers: Option<SchemaNode>,
    #[serde(default)]
    pub body: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTemplate {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: Option<SchemaNode>,
    #[serde(default)]
    pub body: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTemplate {
    pub requests: Vec<RequestTemplate>,
    #[serde(default)]
    pub response: Option<ResponseTemplate>,
}

/// Everything a batch has seen so far. `requests` and `responses` are
/// index-aligned and only ever appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    pub original: Request,
    pub requests: Vec<Request>,
    pub responses: Vec<Response>,
}

impl BatchState {
    pub fn new(original: Request) -> Self {
        Self {
            original,
            requests: Vec::new(),
            responses: Vec::new(),
        }
    }

    fn record(&mut self, request: Request, response: Response) {
        self.requests.push(request);
        self.responses.push(response);
    }

    /// Fresh query context over the whole state.
    pub fn context(&self) -> Result<Context> {
        Context::from_serializable(self)
    }
}

/// Sends one request and waits for its response.
pub trait RequestDispatcher {
    fn dispatch(&mut self, request: &Request) -> Result<Response>;
}

impl<F> RequestDispatcher for F
where
    F: FnMut(&Request) -> Result<Response>,
{
    fn dispatch(&mut self, request: &Request) -> Result<Response> {
        self(request)
    }
}

/// Answers with canned responses, in order.
#[derive(Debug, Clone, Default)]
pub struct ReplayDispatcher {
    responses: VecDeque<Response>,
    seen: Vec<Request>,
}

impl ReplayDispatcher {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            seen: Vec::new(),
        }
    }

    /// Requests dispatched so far.
    pub fn seen(&self) -> &[Request] {
        &self.seen
    }

    /// Recorded responses not yet handed out.
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl RequestDispatcher for ReplayDispatcher {
    fn dispatch(&mut self, request: &Request) -> Result<Response> {
        self.seen.push(request.clone());
        self.responses.pop_front().ok_or_else(|| Error::Dispatch {
            method: request.http_method.to_string(),
            url: request.url.clone(),
            message: "no recorded response left".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Stepping(usize),
    Finalizing,
    Done,
}

/// Runs batch templates one request at a time.
pub struct BatchEngine<D> {
    evaluator: Evaluator,
    dispatcher: D,
}

impl<D: RequestDispatcher> BatchEngine<D> {
    pub fn new(evaluator: Evaluator, dispatcher: D) -> Self {
        Self {
            evaluator,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// Execute every request template in order, then build the final
    /// response. Without a response template the accumulated state is
    /// returned as the body.
    pub fn execute(&mut self, original: &Request, template: &BatchTemplate) -> Result<Response> {
        let mut phase = Phase::Init;
        debug!(?phase, steps = template.requests.len(), "batch start");
        let mut state = BatchState::new(original.clone());
        let mut ctx = state.context()?;

        for (i, request_template) in template.requests.iter().enumerate() {
            phase = Phase::Stepping(i);
            debug!(?phase, "batch step");
            let request = self.build_request(request_template, &ctx)?;
            info!(step = i, method = %request.http_method, url = %request.url, "dispatch");
            let response = self.dispatcher.dispatch(&request).map_err(|e| {
                error!(step = i, error = %e, "dispatch failed");
                e
            })?;
            state.record(request, response);
            ctx = state.context()?;
            if tracing::enabled!(Level::TRACE) {
                trace!(step = i, context = %ctx.serialize()?, "context rebuilt");
            }
        }

        phase = Phase::Finalizing;
        debug!(?phase, "batch finalize");
        let response = match &template.response {
            Some(response_template) => self.build_response(response_template, &ctx)?,
            None => Response {
                body: Some(serde_json::to_value(&state)?),
                ..Response::default()
            },
        };
        phase = Phase::Done;
        debug!(?phase, status = response.status, "batch done");
        Ok(response)
    }

    fn build_request(&self, template: &RequestTemplate, ctx: &Context) -> Result<Request> {
        let url = match self
            .evaluator
            .evaluate_expression(&format!("str {}", template.url), ctx)?
        {
            Value::Null => {
                error!(url = %template.url, "request url resolved to null");
                return Err(Error::Evaluation(format!(
                    "url `{}` resolved to nothing",
                    template.url
                )));
            }
            url => url,
        };
        let body = match &template.body {
            Some(schema) => Some(self.evaluator.evaluate(schema, ctx)?),
            None => None,
        };
        let headers = match &template.headers {
            Some(schema) => self.build_headers(schema, ctx)?,
            None => Headers::new(),
        };
        Ok(Request {
            http_method: template.http_method,
            url: types::stringify(&url),
            headers,
            body,
        })
    }

    fn build_response(&self, template: &ResponseTemplate, ctx: &Context) -> Result<Response> {
        let body = match &template.body {
            Some(schema) => Some(self.evaluator.evaluate(schema, ctx)?),
            None => None,
        };
        let headers = match &template.headers {
            Some(schema) => self.build_headers(schema, ctx)?,
            None => Headers::new(),
        };
        Ok(Response {
            status: template.status.unwrap_or_else(default_status),
            headers,
            body,
        })
    }

    /// Headers schemas must build an object. Arrays become multi-valued
    /// headers, scalars single-valued ones, nulls are dropped.
    fn build_headers(&self, schema: &SchemaNode, ctx: &Context) -> Result<Headers> {
        let Value::Object(map) = self.evaluator.evaluate(schema, ctx)? else {
            return Err(Error::Schema("headers schema must build an object".to_string()));
        };
        Ok(map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| {
                let values = match value {
                    Value::Array(items) => items
                        .iter()
                        .filter(|v| !v.is_null())
                        .map(types::stringify)
                        .collect(),
                    other => vec![types::stringify(&other)],
                };
                (name, values)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn template(value: Value) -> BatchTemplate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn headers_are_normalized_to_string_lists() {
        let engine = BatchEngine::new(Evaluator::default(), ReplayDispatcher::default());
        let schema = SchemaNode::from_json(&json!({
            "x-one": "int 1",
            "x-many": "str[] $.tags",
            "x-none": "str $.missing"
        }))
        .unwrap();
        let ctx = Context::new(json!({"tags": ["a", "b"]}));
        let headers = engine.build_headers(&schema, &ctx).unwrap();
        assert_eq!(
            headers.into_iter().collect::<Vec<_>>(),
            vec![
                ("x-one".to_string(), vec!["1".to_string()]),
                ("x-many".to_string(), vec!["a".to_string(), "b".to_string()]),
            ]
        );
    }

    #[test]
    fn non_object_headers_are_a_schema_error() {
        let engine = BatchEngine::new(Evaluator::default(), ReplayDispatcher::default());
        let schema = SchemaNode::scalar("str nope");
        assert!(matches!(
            engine.build_headers(&schema, &Context::default()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn request_without_headers_gets_empty_map() {
        let mut engine = BatchEngine::new(
            Evaluator::default(),
            ReplayDispatcher::new([Response::default()]),
        );
        let t = template(json!({"requests": [{"httpMethod": "DELETE", "url": "/things/1"}]}));
        engine.execute(&Request::default(), &t).unwrap();
        let sent = &engine.dispatcher().seen()[0];
        assert_eq!(sent.http_method, HttpMethod::Delete);
        assert!(sent.headers.is_empty());
        assert_eq!(sent.body, None);
    }

    #[test]
    fn url_must_resolve() {
        let mut engine = BatchEngine::new(Evaluator::default(), ReplayDispatcher::default());
        let t = template(json!({"requests": [{"url": "$.responses[0].body.next"}]}));
        assert!(matches!(
            engine.execute(&Request::default(), &t),
            Err(Error::Evaluation(_))
        ));
        assert!(engine.dispatcher().seen().is_empty());
    }

    #[test]
    fn replay_hands_back_its_record() {
        let mut engine = BatchEngine::new(
            Evaluator::default(),
            ReplayDispatcher::new(vec![Response::default(); 3]),
        );
        let t = template(json!({"requests": [{"url": "/a"}, {"url": "/b"}]}));
        engine.execute(&Request::default(), &t).unwrap();
        let replay = engine.into_dispatcher();
        assert_eq!(replay.remaining(), 1);
        assert_eq!(
            replay.seen().iter().map(|r| r.url.as_str()).collect::<Vec<_>>(),
            vec!["/a", "/b"]
        );
    }

    #[test]
    fn replay_runs_out() {
        let mut engine = BatchEngine::new(Evaluator::default(), ReplayDispatcher::default());
        let t = template(json!({"requests": [{"url": "/a"}]}));
        assert!(matches!(
            engine.execute(&Request::default(), &t),
            Err(Error::Dispatch { .. })
        ));
    }

    #[test]
    fn state_serializes_with_camel_case_fields() {
        let state = BatchState::new(Request {
            http_method: HttpMethod::Post,
            url: "/x".into(),
            ..Request::default()
        });
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({
                "original": {"httpMethod": "POST", "url": "/x", "headers": {}, "body": null},
                "requests": [],
                "responses": []
            })
        );
    }
}
