use crate::errors::Result;
use crate::jsonpath;
use serde::Serialize;
use serde_json::Value;

/// A JSON document wrapped for path queries.
///
/// Evaluation never mutates a context; a new one is built whenever the
/// underlying document changes (per array item, per batch step).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    document: Value,
}

impl Context {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    /// Parse JSON text into a fresh context.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Build a context from anything serializable, going through the same
    /// value model a reparse would produce.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Query the document. Missing values come back as `Null`.
    pub fn read(&self, path: &str) -> Result<Value> {
        jsonpath::query(&self.document, path)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.document)?)
    }
}
