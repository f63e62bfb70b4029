//! Schema model for API response bodies.
//!
//! OpenAPI v2 models and v3 schemas are both deserialized into a single
//! [`SchemaNode`] tree. The shape of a node is a closed [`SchemaKind`] so the
//! example resolver can dispatch exhaustively.

use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// A structural description of a potential response body.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Structural shape
    pub kind: SchemaKind,
    /// Literal example, overrides structural synthesis
    pub example: Option<Value>,
    /// Enumerated literals, the first one is used when no example is given
    pub enumeration: Option<Vec<Value>>,
}

/// Shape of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Primitive declared by type name (`string`, `integer`, ...)
    Scalar { ty: String },
    /// Object with ordered properties and an optional open-map value schema
    Object {
        properties: IndexMap<String, SchemaNode>,
        additional_properties: Option<Box<SchemaNode>>,
    },
    /// Array of `items`
    Array { items: Box<SchemaNode> },
    /// `$ref` pointer into the definitions table
    Reference { pointer: String },
    /// `allOf` composition
    Composed { all_of: Vec<SchemaNode> },
    /// Nothing recognizable
    Empty,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            example: None,
            enumeration: None,
        }
    }

    pub fn scalar(ty: &str) -> Self {
        Self::new(SchemaKind::Scalar { ty: ty.to_string() })
    }

    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        Self::new(SchemaKind::Object {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            additional_properties: None,
        })
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::new(SchemaKind::Array {
            items: Box::new(items),
        })
    }

    pub fn reference(pointer: &str) -> Self {
        Self::new(SchemaKind::Reference {
            pointer: pointer.to_string(),
        })
    }

    pub fn composed(all_of: Vec<SchemaNode>) -> Self {
        Self::new(SchemaKind::Composed { all_of })
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enumeration = Some(values);
        self
    }

    /// Declared type name, as written in the document.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Scalar { ty } => Some(ty),
            SchemaKind::Object { .. } => Some("object"),
            SchemaKind::Array { .. } => Some("array"),
            SchemaKind::Reference { .. } | SchemaKind::Composed { .. } | SchemaKind::Empty => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, SchemaKind::Array { .. })
            || matches!(&self.kind, SchemaKind::Scalar { ty } if ty == "array")
    }
}

/// Named schema definitions (`definitions` in v2, `components.schemas` in v3).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Definitions {
    schemas: IndexMap<String, SchemaNode>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: SchemaNode) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, SchemaNode)> for Definitions {
    fn from_iter<T: IntoIterator<Item = (K, SchemaNode)>>(iter: T) -> Self {
        Self {
            schemas: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Resolves `#/.../<name>` pointers against a definitions table.
#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    definitions: &'a Definitions,
}

impl<'a> RefResolver<'a> {
    pub fn new(definitions: &'a Definitions) -> Self {
        Self { definitions }
    }

    /// Look up the definition named by the trailing segment of `pointer`.
    pub fn resolve(&self, pointer: &str) -> Result<&'a SchemaNode, SchemaError> {
        self.definitions
            .get(simple_ref(pointer))
            .ok_or_else(|| SchemaError::UnresolvedReference {
                pointer: pointer.to_string(),
            })
    }
}

/// An unreadable fragment becomes [`SchemaKind::Empty`] without failing
/// the enclosing document.
impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match serde_json::from_value::<RawSchema>(value) {
            Ok(raw) => Ok(raw.into()),
            Err(err) => {
                warn!(error = %err, "Ignoring malformed schema fragment");
                Ok(SchemaNode::new(SchemaKind::Empty))
            }
        }
    }
}

/// Trailing segment of a reference pointer.
pub fn simple_ref(pointer: &str) -> &str {
    pointer
        .rsplit_once('/')
        .map(|(_, name)| name)
        .unwrap_or(pointer)
}

// Raw document shape, shared by Swagger models and OpenAPI v3 schemas.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(rename = "type")]
    ty: Option<RawType>,
    properties: Option<IndexMap<String, SchemaNode>>,
    additional_properties: Option<RawAdditional>,
    items: Option<Box<SchemaNode>>,
    all_of: Option<Vec<SchemaNode>>,
    example: Option<Value>,
    #[serde(rename = "enum")]
    enumeration: Option<Vec<Value>>,
}

/// OpenAPI 3.1 allows `type: [string, "null"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawType {
    One(String),
    Many(Vec<String>),
}

impl RawType {
    fn into_name(self) -> Option<String> {
        match self {
            RawType::One(name) => Some(name),
            RawType::Many(names) => names.into_iter().find(|n| n != "null"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAdditional {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

impl From<RawSchema> for SchemaNode {
    fn from(raw: RawSchema) -> Self {
        let ty = raw.ty.and_then(RawType::into_name);
        let additional = match raw.additional_properties {
            Some(RawAdditional::Schema(schema)) => Some(schema),
            // The open-map flag never hides declared properties.
            Some(RawAdditional::Allowed(true)) if raw.properties.is_none() => {
                Some(Box::new(SchemaNode::scalar("object")))
            }
            Some(RawAdditional::Allowed(_)) | None => None,
        };

        let kind = if let Some(pointer) = raw.reference {
            SchemaKind::Reference { pointer }
        } else if let Some(all_of) = raw.all_of {
            SchemaKind::Composed { all_of }
        } else if let Some(items) = raw.items {
            SchemaKind::Array { items }
        } else if raw.properties.is_some()
            || additional.is_some()
            || ty.as_deref() == Some("object")
        {
            SchemaKind::Object {
                properties: raw.properties.unwrap_or_default(),
                additional_properties: additional,
            }
        } else if let Some(ty) = ty {
            SchemaKind::Scalar { ty }
        } else {
            SchemaKind::Empty
        };

        SchemaNode {
            kind,
            example: raw.example,
            enumeration: raw.enumeration,
        }
    }
}
