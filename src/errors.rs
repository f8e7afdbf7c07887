use thiserror::Error;

// Every failure the engine can report. None of them are recovered from
// inside the engine; they surface to whoever called `evaluate` or `execute`.
#[derive(Debug, Error)]
pub enum Error {
    // Malformed expression text (unbalanced call, unterminated quote, ...)
    #[error("syntax error: {0}")]
    Syntax(String),

    // Schema node with an invalid shape
    #[error("schema error: {0}")]
    Schema(String),

    // Leading word of a scalar expression is not a known type tag
    #[error("unsupported type tag: `{0}`")]
    UnsupportedTypeTag(String),

    // Function name not present in the registry
    #[error("unsupported function: `{0}`")]
    UnsupportedFunction(String),

    // Function exists but does not produce the requested type
    #[error("function `{function}` does not support type `{tag}`")]
    UnsupportedType { function: String, tag: String },

    // Wrong number or shape of function arguments
    #[error("argument error in `{function}`: {message}")]
    Argument { function: String, message: String },

    #[error("cannot cast {value} to {tag}")]
    Cast { value: String, tag: String },

    // A value required downstream resolved to nothing
    #[error("evaluation error: {0}")]
    Evaluation(String),

    // Malformed JSONPath handed to the query engine
    #[error("query error in `{path}`: {message}")]
    Query { path: String, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // Reported by a request dispatcher; never retried here
    #[error("dispatch of {method} {url} failed: {message}")]
    Dispatch {
        method: String,
        url: String,
        message: String,
    },
}

impl Error {
    pub(crate) fn cast(value: impl std::fmt::Display, tag: impl std::fmt::Display) -> Self {
        Error::Cast {
            value: value.to_string(),
            tag: tag.to_string(),
        }
    }

    pub(crate) fn argument(function: &str, message: impl Into<String>) -> Self {
        Error::Argument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
