use crate::errors::{Error, Result};
use crate::types::{ScalarType, Type};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{trace, warn};

pub mod builtins;

/// Scalar tags only.
pub const SCALAR_TYPES: &[Type] = &[
    Type::Scalar(ScalarType::String),
    Type::Scalar(ScalarType::Integer),
    Type::Scalar(ScalarType::Number),
    Type::Scalar(ScalarType::Boolean),
    Type::Scalar(ScalarType::Object),
];

/// Array tags only.
pub const ARRAY_TYPES: &[Type] = &[
    Type::Array(ScalarType::String),
    Type::Array(ScalarType::Integer),
    Type::Array(ScalarType::Number),
    Type::Array(ScalarType::Boolean),
    Type::Array(ScalarType::Object),
];

pub const ALL_TYPES: &[Type] = &[
    Type::Scalar(ScalarType::String),
    Type::Scalar(ScalarType::Integer),
    Type::Scalar(ScalarType::Number),
    Type::Scalar(ScalarType::Boolean),
    Type::Scalar(ScalarType::Object),
    Type::Array(ScalarType::String),
    Type::Array(ScalarType::Integer),
    Type::Array(ScalarType::Number),
    Type::Array(ScalarType::Boolean),
    Type::Array(ScalarType::Object),
];

/// A named operation callable from expressions.
///
/// Arguments arrive fully evaluated: paths resolved, nested calls invoked,
/// literals parsed. `target` is the tag requested by the enclosing
/// expression, or `None` when the call is nested inside another call.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn supported_types(&self) -> &'static [Type];
    fn arity(&self) -> RangeInclusive<usize>;
    fn invoke(&self, target: Option<Type>, args: &[Value]) -> Result<Value>;
}

/// Function lookup table, cheap to clone and share across threads.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtins::Sum);
        registry.register(builtins::Min);
        registry.register(builtins::Max);
        registry.register(builtins::Avg);
        registry.register(builtins::Count);
        registry.register(builtins::Lower);
        registry.register(builtins::Upper);
        registry.register(builtins::First);
        registry.register(builtins::Unique);
        registry.register(builtins::OrDefault);
        registry
    }

    /// Add or replace a function under its own name.
    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Look up `name`, check the requested tag and the argument count, then
    /// call it.
    pub fn invoke(&self, name: &str, target: Option<Type>, args: &[Value]) -> Result<Value> {
        let function = self.get(name).ok_or_else(|| {
            warn!(function = name, "unsupported function");
            Error::UnsupportedFunction(name.to_string())
        })?;
        if let Some(ty) = target {
            if !function.supported_types().contains(&ty) {
                warn!(function = name, %ty, "function does not support type");
                return Err(Error::UnsupportedType {
                    function: name.to_string(),
                    tag: ty.to_string(),
                });
            }
        }
        let arity = function.arity();
        if !arity.contains(&args.len()) {
            return Err(Error::argument(
                name,
                format!(
                    "expected {}..={} arguments, got {}",
                    arity.start(),
                    arity.end(),
                    args.len()
                ),
            ));
        }
        trace!(function = name, ?target, argc = args.len(), "invoke");
        function.invoke(target, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Echo;
    impl Function for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn supported_types(&self) -> &'static [Type] {
            SCALAR_TYPES
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn invoke(&self, _target: Option<Type>, args: &[Value]) -> Result<Value> {
            Ok(args[0].clone())
        }
    }

    #[test]
    fn custom_function_is_callable() {
        let mut registry = Registry::with_builtins();
        registry.register(Echo);
        assert_eq!(
            registry.invoke("echo", Some(Type::STRING), &[json!("hi")]).unwrap(),
            json!("hi")
        );
        assert!(registry.names().contains(&"echo"));
    }

    #[test]
    fn unknown_function() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.invoke("nope", None, &[]),
            Err(Error::UnsupportedFunction(name)) if name == "nope"
        ));
    }

    #[test]
    fn unsupported_target_type() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.invoke("sum", Some(Type::STRING), &[json!([1])]),
            Err(Error::UnsupportedType { .. })
        ));
    }

    #[test]
    fn arity_is_checked() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.invoke("sum", Some(Type::INTEGER), &[json!(1), json!(2)]),
            Err(Error::Argument { .. })
        ));
    }

    #[test]
    fn clones_share_until_modified() {
        let base = Registry::with_builtins();
        let mut extended = base.clone();
        extended.register(Echo);
        assert!(base.get("echo").is_none());
        assert!(extended.get("echo").is_some());
    }
}
