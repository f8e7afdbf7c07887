//! Declarative JSON-to-JSON transformation and templated request batches.
//!
//! A schema is a JSON tree whose string leaves are small typed expressions:
//!
//! ```text
//! "int $.order.id"                 JSONPath, cast to integer
//! "num sum($.items[*].amount)"     function call
//! "str Hello, @{str $.name}@!"     string with inline expressions
//! "obj {\"fixed\": true}"          JSON literal
//! ```

pub mod batch;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod functions;
pub mod schema;
pub mod tokenizer;
pub mod types;
mod comparison;
mod filter;
mod jsonpath;
mod parser;

pub use batch::{
    BatchEngine, BatchState, BatchTemplate, Headers, HttpMethod, ReplayDispatcher, Request,
    RequestDispatcher, RequestTemplate, Response, ResponseTemplate,
};
pub use context::Context;
pub use errors::{Error, Result};
pub use evaluator::{EvalOptions, Evaluator};
pub use functions::{Function, Registry};
pub use schema::{ArrayOf, SchemaNode};
pub use types::{ScalarType, Type};

use serde_json::Value;

/// Evaluate a JSON-form schema against a document with the built-in
/// functions.
pub fn evaluate(schema: &Value, document: &Value) -> Result<Value> {
    Evaluator::default().evaluate_json(schema, &Context::new(document.clone()))
}

/// Run a JSONPath query directly. Definite paths yield one value or null,
/// others an array of matches.
pub fn query(document: &Value, path: &str) -> Result<Value> {
    jsonpath::query(document, path)
}
