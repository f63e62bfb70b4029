//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while walking an API definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A `$ref` pointer names a definition that does not exist
    #[error("Unresolved reference: '{pointer}'")]
    UnresolvedReference { pointer: String },

    /// The document could not be parsed as OpenAPI v2 or v3
    #[error("Invalid API definition: {0}")]
    InvalidDocument(String),
}

/// Errors raised while building a mock configuration from an operation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The operation declares no responses at all
    #[error("Operation declares no responses")]
    NoResponses,

    /// The resolved example could not be serialized to text
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A template could not be evaluated against the request context.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template text is malformed or references missing data
    #[error("Unable to evaluate template '{template}': {reason}")]
    Evaluation { template: String, reason: String },
}

impl TemplateError {
    pub fn evaluation(template: &str, reason: impl ToString) -> Self {
        Self::Evaluation {
            template: template.to_string(),
            reason: reason.to_string(),
        }
    }
}
