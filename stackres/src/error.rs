//! Error types shared by all handlers.

use thiserror::Error;

/// Property validation errors, raised before any provider call.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("The {0} property was not specified.")]
    Missing(String),

    #[error("The {0} property cannot be empty.")]
    Empty(String),

    #[error("The {0} property must be a string.")]
    NotString(String),

    #[error("The {0} property must be a boolean type.")]
    NotBoolean(String),

    #[error("The {0} property must be an array.")]
    NotArray(String),

    #[error("The {0} property must include key-value pairs only.")]
    NotKeyValue(String),

    #[error("The {property} property contains an invalid regular expression: {source}")]
    InvalidRegex {
        property: String,
        #[source]
        source: regex::Error,
    },

    #[error("Either {} property has to be set.", .0.join(" or "))]
    NoIdentity(Vec<String>),

    #[error("The {0} and {1} properties cannot both be set.")]
    Conflicting(String, String),

    #[error("The ResourceProperties must be a key-value mapping.")]
    NotAMapping,

    #[error("Unknown event RequestType: {0}")]
    UnknownRequestType(String),

    #[error("No handler is registered for {0}.")]
    UnknownHandler(String),
}

/// A failure reported by the provider API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Provider error code (e.g. `NoSuchHostedZone`).
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error carries the given provider code.
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Terminal outcome of a failed handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Ambiguous(String),

    #[error("{0}")]
    NotAvailable(String),

    #[error("{0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, HandlerError>;
