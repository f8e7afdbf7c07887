use crate::errors::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key that carries the iteration source of an array element schema in the
/// JSON form of a schema.
pub const ARRAY_PATH_KEY: &str = "__array_path";

/// Template describing how to build a JSON value.
///
/// In JSON a schema is a string expression, an object of schemas, or an
/// array of object schemas each holding an `__array_path`:
///
/// ```json
/// {
///   "total": "num sum($.items[*].amount)",
///   "lines": [{ "__array_path": "$.items[*]", "sku": "str $.sku" }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// `"<type> <expression>"`
    Scalar(String),
    /// Output object, keys kept in schema order.
    Object(Vec<(String, SchemaNode)>),
    /// Concatenation of every element's items.
    Array(Vec<ArrayOf>),
}

/// Builds one output item per value selected by `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOf {
    pub path: String,
    pub element: SchemaNode,
}

impl SchemaNode {
    pub fn scalar(expression: impl Into<String>) -> Self {
        SchemaNode::Scalar(expression.into())
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(SchemaNode::Scalar(s.clone())),
            Value::Object(map) => Ok(SchemaNode::Object(object_fields(map)?)),
            Value::Array(items) => items
                .iter()
                .map(array_of)
                .collect::<Result<Vec<_>>>()
                .map(SchemaNode::Array),
            other => Err(Error::Schema(format!(
                "schema nodes must be strings, objects or arrays, found {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Scalar(s) => Value::String(s.clone()),
            SchemaNode::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            SchemaNode::Array(elements) => Value::Array(
                elements
                    .iter()
                    .map(|el| {
                        let mut map = Map::new();
                        map.insert(ARRAY_PATH_KEY.to_string(), Value::String(el.path.clone()));
                        if let Value::Object(fields) = el.element.to_json() {
                            map.extend(fields);
                        }
                        Value::Object(map)
                    })
                    .collect(),
            ),
        }
    }
}

fn object_fields(map: &Map<String, Value>) -> Result<Vec<(String, SchemaNode)>> {
    map.iter()
        .filter(|(key, _)| key.as_str() != ARRAY_PATH_KEY)
        .map(|(key, child)| -> Result<(String, SchemaNode)> {
            Ok((key.clone(), SchemaNode::from_json(child)?))
        })
        .collect()
}

fn array_of(item: &Value) -> Result<ArrayOf> {
    let Value::Object(map) = item else {
        return Err(Error::Schema(format!(
            "array schema elements must be objects, found {item}"
        )));
    };
    let path = match map.get(ARRAY_PATH_KEY) {
        Some(Value::String(path)) => path.clone(),
        Some(other) => {
            return Err(Error::Schema(format!(
                "`{ARRAY_PATH_KEY}` must be a string, found {other}"
            )))
        }
        None => {
            return Err(Error::Schema(format!(
                "missing `{ARRAY_PATH_KEY}` in array element schema"
            )))
        }
    };
    Ok(ArrayOf {
        path,
        element: SchemaNode::Object(object_fields(map)?),
    })
}

impl From<&str> for SchemaNode {
    fn from(s: &str) -> Self {
        SchemaNode::scalar(s)
    }
}

impl TryFrom<Value> for SchemaNode {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        SchemaNode::from_json(&value)
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SchemaNode::from_json(&value).map_err(serde::de::Error::custom)
    }
}
