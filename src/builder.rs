//! Builds mock configurations from API operations.
//!
//! The first declared response of an operation is mocked: its key becomes
//! the status and its body comes from an explicit example, a named
//! example, or schema-driven synthesis, in that order.

use crate::config::{HttpHeader, MockConfiguration};
use crate::error::BuildError;
use crate::example::{ResolvedBody, SchemaExampleResolver};
use crate::openapi::{ApiDefinition, OperationResponses, ResponseSpec};
use crate::schema::Definitions;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

const DEFAULT_STATUS: u16 = 200;

/// A configuration generated for one operation of an API definition.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMock {
    pub path: String,
    pub method: String,
    pub configuration: MockConfiguration,
}

/// Turns declared operation responses into [`MockConfiguration`]s.
#[derive(Debug, Clone, Default)]
pub struct ResponseConfigBuilder {
    pretty: bool,
}

impl ResponseConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent generated content.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Build the configuration mocking the first declared response.
    ///
    /// Selection follows declaration order, not status code order: an
    /// operation declaring `404` before `200` is mocked as a `404`.
    pub fn build(
        &self,
        definitions: &Definitions,
        responses: &OperationResponses,
    ) -> Result<MockConfiguration, BuildError> {
        let (key, response) = responses.first().ok_or(BuildError::NoResponses)?;

        let status = key.parse::<u16>().unwrap_or_else(|_| {
            debug!(key = %key, "Non-numeric response key, using default status");
            DEFAULT_STATUS
        });

        let resolver = SchemaExampleResolver::new(definitions);
        let content = match select_body(&resolver, response) {
            Some(body) => Some(self.serialize(&stringify_numbers(body))?),
            None => None,
        };

        Ok(MockConfiguration {
            status,
            headers: vec![HttpHeader::new("Content-Type", "application/json")],
            content,
        })
    }

    /// Build a configuration for every operation of `api`, in document order.
    ///
    /// Operations without any declared response are skipped.
    pub fn build_all(&self, api: &ApiDefinition) -> Result<Vec<GeneratedMock>, BuildError> {
        let mut mocks = Vec::with_capacity(api.operations().len());
        for operation in api.operations() {
            match self.build(api.definitions(), &operation.responses) {
                Ok(configuration) => mocks.push(GeneratedMock {
                    path: operation.path.clone(),
                    method: operation.method.clone(),
                    configuration,
                }),
                Err(BuildError::NoResponses) => {
                    warn!(
                        method = %operation.method,
                        path = %operation.path,
                        "Operation declares no responses, skipping"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        info!(operations = mocks.len(), "Generated mock configurations");
        Ok(mocks)
    }

    fn serialize(&self, value: &Value) -> Result<String, BuildError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }
}

fn select_body(resolver: &SchemaExampleResolver<'_>, response: &ResponseSpec) -> Option<Value> {
    if let Some(example) = &response.example {
        return Some(example.clone());
    }
    if let Some((name, value)) = response.examples.first() {
        let mut named = Map::new();
        named.insert(name.clone(), value.clone());
        return Some(Value::Object(named));
    }
    response
        .schema
        .as_ref()
        .and_then(|schema| resolver.resolve_body(schema))
        .map(ResolvedBody::into_value)
}

/// Replace every number in `value` by its decimal text.
pub fn stringify_numbers(value: Value) -> Value {
    match value {
        Value::Number(number) => Value::String(number.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(stringify_numbers).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name, stringify_numbers(value)))
                .collect(),
        ),
        other => other,
    }
}
