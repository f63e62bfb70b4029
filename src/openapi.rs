//! OpenAPI document loading.
//!
//! Reads Swagger 2.0 and OpenAPI 3.x documents (YAML or JSON) into the
//! dialect-neutral [`Definitions`] table and per-operation
//! [`OperationResponses`] consumed by the builder.

use crate::error::SchemaError;
use crate::schema::{simple_ref, Definitions, SchemaNode};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Responses declared by an operation, keyed by status code or `default`,
/// in document order.
pub type OperationResponses = IndexMap<String, ResponseSpec>;

/// A single declared response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSpec {
    /// Body schema
    pub schema: Option<SchemaNode>,
    /// Explicit example literal
    pub example: Option<Value>,
    /// Named examples, in document order
    pub examples: IndexMap<String, Value>,
}

/// An API operation and its declared responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub path: String,
    /// Lowercase HTTP method
    pub method: String,
    pub responses: OperationResponses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Swagger 2.0
    V2,
    /// OpenAPI 3.x
    V3,
}

/// A loaded API definition.
#[derive(Debug, Clone)]
pub struct ApiDefinition {
    dialect: Dialect,
    definitions: Definitions,
    operations: Vec<Operation>,
}

impl ApiDefinition {
    /// Load a definition from a YAML or JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(content.parse::<Self>()?)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Find an operation by path and (case-insensitive) method.
    pub fn operation(&self, path: &str, method: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.path == path && op.method.eq_ignore_ascii_case(method))
    }
}

impl FromStr for ApiDefinition {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw: RawDocument =
            serde_yaml::from_str(text).map_err(|e| SchemaError::InvalidDocument(e.to_string()))?;

        let dialect = match (raw.swagger.as_deref(), raw.openapi.as_deref()) {
            (Some(version), _) if version.starts_with('2') => Dialect::V2,
            (_, Some(version)) if version.starts_with('3') => Dialect::V3,
            _ => {
                return Err(SchemaError::InvalidDocument(
                    "missing 'swagger: 2.0' or 'openapi: 3.x' version field".to_string(),
                ))
            }
        };

        let (definitions, shared_responses) = match dialect {
            Dialect::V2 => (raw.definitions, raw.responses),
            Dialect::V3 => (raw.components.schemas, raw.components.responses),
        };

        let mut operations = Vec::new();
        for (path, item) in raw.paths {
            for (method, operation) in item.into_operations() {
                let responses = operation
                    .responses
                    .into_iter()
                    .filter_map(|(key, response)| {
                        let response = response.dereference(&shared_responses)?;
                        Some((key, response.into_spec(dialect)))
                    })
                    .collect();
                operations.push(Operation {
                    path: path.clone(),
                    method: method.to_string(),
                    responses,
                });
            }
        }

        Ok(Self {
            dialect,
            definitions,
            operations,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    swagger: Option<String>,
    openapi: Option<String>,
    #[serde(default)]
    definitions: Definitions,
    #[serde(default)]
    responses: IndexMap<String, RawResponse>,
    #[serde(default)]
    components: RawComponents,
    #[serde(default)]
    paths: IndexMap<String, RawPathItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RawComponents {
    #[serde(default)]
    schemas: Definitions,
    #[serde(default)]
    responses: IndexMap<String, RawResponse>,
}

#[derive(Debug, Deserialize)]
struct RawPathItem {
    get: Option<RawOperation>,
    put: Option<RawOperation>,
    post: Option<RawOperation>,
    delete: Option<RawOperation>,
    options: Option<RawOperation>,
    head: Option<RawOperation>,
    patch: Option<RawOperation>,
    trace: Option<RawOperation>,
}

impl RawPathItem {
    fn into_operations(self) -> impl Iterator<Item = (&'static str, RawOperation)> {
        [
            ("get", self.get),
            ("put", self.put),
            ("post", self.post),
            ("delete", self.delete),
            ("options", self.options),
            ("head", self.head),
            ("patch", self.patch),
            ("trace", self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.map(|op| (method, op)))
    }
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    #[serde(default)]
    responses: IndexMap<String, RawResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawResponse {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    // v2
    schema: Option<SchemaNode>,
    examples: Option<IndexMap<String, Value>>,
    // v3
    content: Option<IndexMap<String, RawMediaType>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMediaType {
    schema: Option<SchemaNode>,
    example: Option<Value>,
    examples: Option<IndexMap<String, RawExample>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawExample {
    value: Option<Value>,
}

impl RawResponse {
    /// Follow a `$ref` to a shared response; unresolvable responses are dropped.
    fn dereference(self, shared: &IndexMap<String, RawResponse>) -> Option<RawResponse> {
        match &self.reference {
            Some(pointer) => {
                let target = shared.get(simple_ref(pointer));
                if target.is_none() {
                    warn!(pointer = %pointer, "Shared response not found");
                }
                target.filter(|t| t.reference.is_none()).cloned()
            }
            None => Some(self),
        }
    }

    fn into_spec(self, dialect: Dialect) -> ResponseSpec {
        match dialect {
            Dialect::V2 => ResponseSpec {
                schema: self.schema,
                example: self
                    .examples
                    .and_then(|mut examples| examples.shift_remove(JSON_MEDIA_TYPE))
                    .map(parse_embedded_json),
                examples: IndexMap::new(),
            },
            Dialect::V3 => {
                let Some((_, media)) = self.content.and_then(|c| c.into_iter().next()) else {
                    return ResponseSpec::default();
                };
                ResponseSpec {
                    schema: media.schema,
                    example: media.example,
                    examples: media
                        .examples
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(name, example)| (name, example.value.unwrap_or(Value::Null)))
                        .collect(),
                }
            }
        }
    }
}

/// Swagger examples are often JSON documents written as strings.
fn parse_embedded_json(example: Value) -> Value {
    match example {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}
