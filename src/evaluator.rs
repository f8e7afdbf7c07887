use crate::context::Context;
use crate::errors::{Error, Result};
use crate::functions::Registry;
use crate::schema::SchemaNode;
use crate::tokenizer::{tokenize_with_depth, Token};
use crate::types::{self, ScalarType, Type};
use num_bigint::BigInt;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::{debug, error, trace};

pub const INLINE_OPEN: &str = "@{";
pub const INLINE_CLOSE: &str = "}@";

/// Nesting accepted by default before evaluation gives up.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Evaluator knobs.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Deepest chain of nested schema nodes, function calls and inline
    /// expressions accepted before evaluation is aborted with a schema error.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Builds JSON values from schemas.
#[derive(Clone)]
pub struct Evaluator {
    registry: Registry,
    options: EvalOptions,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate `node` against `ctx`.
    pub fn evaluate(&self, node: &SchemaNode, ctx: &Context) -> Result<Value> {
        debug!(schema = ?node, "evaluate");
        self.node(node, ctx, 0)
    }

    /// Evaluate a schema given in its JSON form.
    pub fn evaluate_json(&self, schema: &Value, ctx: &Context) -> Result<Value> {
        self.evaluate(&SchemaNode::from_json(schema)?, ctx)
    }

    /// Evaluate one `"<type> <expression>"` string.
    pub fn evaluate_expression(&self, expression: &str, ctx: &Context) -> Result<Value> {
        self.expression(expression, ctx, 0)
    }

    /// Replace every `@{<type> <expression>}@` span in `text`.
    pub fn interpolate(&self, text: &str, ctx: &Context) -> Result<String> {
        self.interpolate_at(text, ctx, 0)
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        if depth >= self.options.max_depth {
            error!(max_depth = self.options.max_depth, "schema nesting too deep");
            return Err(Error::Schema(format!(
                "nesting deeper than {} levels",
                self.options.max_depth
            )));
        }
        Ok(depth + 1)
    }

    fn node(&self, node: &SchemaNode, ctx: &Context, depth: usize) -> Result<Value> {
        let depth = self.enter(depth)?;
        match node {
            SchemaNode::Scalar(expression) => self.expression(expression, ctx, depth),
            SchemaNode::Object(fields) => {
                let mut out = Map::new();
                for (key, child) in fields {
                    trace!(key = %key, "build field");
                    out.insert(key.clone(), self.node(child, ctx, depth)?);
                }
                Ok(Value::Object(out))
            }
            SchemaNode::Array(elements) => {
                let mut out = Vec::new();
                for element in elements {
                    let items = match ctx.read(&element.path)? {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items,
                        single => vec![single],
                    };
                    trace!(path = %element.path, count = items.len(), "build items");
                    for item in items {
                        let item_ctx = Context::new(item);
                        out.push(self.node(&element.element, &item_ctx, depth)?);
                    }
                }
                Ok(Value::Array(out))
            }
        }
    }

    fn expression(&self, expression: &str, ctx: &Context, depth: usize) -> Result<Value> {
        let depth = self.enter(depth)?;
        let trimmed = expression.trim_start();
        let split = trimmed
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim_start()));
        let Some((word, body)) = split.filter(|(_, body)| !body.is_empty()) else {
            error!(expression, "expression has no body after its type tag");
            return Err(Error::Schema(format!(
                "expected `<type> <expression>`, got `{expression}`"
            )));
        };
        let ty = Type::parse(word).ok_or_else(|| {
            error!(word, "unsupported type tag");
            Error::UnsupportedTypeTag(word.to_string())
        })?;

        let tokens = tokenize_with_depth(body, self.options.max_depth)?;
        match tokens.first() {
            Some(Token::Path(path)) => {
                trace!(path = %path, %ty, "resolve path");
                coerce(ctx.read(path)?, ty)
            }
            Some(Token::FunctionStart(_)) => {
                let mut pos = 0;
                self.call(&tokens, &mut pos, Some(ty), ctx, depth)
            }
            _ => self.raw(ty, body, ctx, depth),
        }
    }

    /// Consume one `FunctionStart .. FunctionEnd` run starting at `pos`.
    fn call(
        &self,
        tokens: &[Token],
        pos: &mut usize,
        target: Option<Type>,
        ctx: &Context,
        depth: usize,
    ) -> Result<Value> {
        let depth = self.enter(depth)?;
        let Some(Token::FunctionStart(name)) = tokens.get(*pos) else {
            return Err(Error::Syntax("expected a function call".to_string()));
        };
        *pos += 1;
        if self.registry.get(name).is_none() {
            error!(function = %name, "unsupported function");
            return Err(Error::UnsupportedFunction(name.clone()));
        }

        let mut args = Vec::new();
        loop {
            match tokens.get(*pos) {
                None => {
                    return Err(Error::Syntax(format!("unterminated call to `{name}`")));
                }
                Some(Token::FunctionEnd) => {
                    *pos += 1;
                    break;
                }
                Some(Token::FunctionStart(_)) => {
                    args.push(self.call(tokens, pos, None, ctx, depth)?);
                }
                Some(Token::Path(path)) => {
                    *pos += 1;
                    args.push(ctx.read(path)?);
                }
                Some(Token::Raw(text)) => {
                    *pos += 1;
                    args.push(self.literal(text, ctx, depth)?);
                }
            }
        }

        trace!(function = %name, ?target, "call");
        let result = self.registry.invoke(name, target, &args)?;
        match target {
            Some(ty) => coerce(result, ty),
            None => Ok(result),
        }
    }

    /// The body of an expression that is neither a path nor a call.
    fn raw(&self, ty: Type, text: &str, ctx: &Context, depth: usize) -> Result<Value> {
        trace!(text, %ty, "raw literal");
        match ty {
            Type::Scalar(ScalarType::String) => {
                Ok(Value::String(self.interpolate_at(text, ctx, depth)?))
            }
            Type::Scalar(t @ (ScalarType::Integer | ScalarType::Number | ScalarType::Boolean)) => {
                types::cast_scalar(&Value::String(text.to_string()), t)
            }
            Type::Scalar(ScalarType::Object) | Type::Array(_) => {
                let parsed = Context::parse(text)
                    .map_err(|_| Error::cast(text, ty))?
                    .into_document();
                coerce(parsed, ty)
            }
        }
    }

    /// Literal function argument: decimal, integer, boolean, else an
    /// interpolated string.
    fn literal(&self, text: &str, ctx: &Context, depth: usize) -> Result<Value> {
        if text.contains('.') {
            if let Some(d) = types::parse_decimal(text) {
                return Ok(types::decimal_value(&d));
            }
        } else if let Ok(i) = BigInt::from_str(text) {
            return Ok(types::integer_value(&i));
        }
        if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
            return Ok(Value::Bool(text.eq_ignore_ascii_case("true")));
        }
        Ok(Value::String(self.interpolate_at(text, ctx, depth)?))
    }

    fn interpolate_at(&self, text: &str, ctx: &Context, depth: usize) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find(INLINE_OPEN) {
            let body_start = open + INLINE_OPEN.len();
            let Some(close) = rest[body_start..].find(INLINE_CLOSE) else {
                break;
            };
            let inner = &rest[body_start..body_start + close];
            // A later opener before the closer starts the innermost span
            if let Some(nested) = inner.rfind(INLINE_OPEN) {
                let skip = body_start + nested;
                out.push_str(&rest[..skip]);
                rest = &rest[skip..];
                continue;
            }
            out.push_str(&rest[..open]);
            let value = self.expression(inner, ctx, depth)?;
            out.push_str(&types::stringify(&value));
            rest = &rest[body_start + close + INLINE_CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Shape a resolved value for `ty`: a scalar tag takes the first element of
/// a collection, an array tag wraps a lone value. `Null` is never cast.
pub fn coerce(value: Value, ty: Type) -> Result<Value> {
    match (value, ty) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Array(items), Type::Scalar(t)) => match items.into_iter().next() {
            Some(first) => types::cast_scalar(&first, t),
            None => Ok(Value::Null),
        },
        (value, ty) => types::cast(&value, ty),
    }
}
