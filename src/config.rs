//! Mock response configuration.
//!
//! A [`MockConfiguration`] is either authored by an operator or generated
//! from an API definition by the builder. It is immutable once loaded and
//! shared by every request the policy handles.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name under which generated configurations are registered.
pub const POLICY_NAME: &str = "mock";

/// Configuration of a mocked response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockConfiguration {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers, values may be templates
    #[serde(default)]
    pub headers: Vec<HttpHeader>,

    /// Response body, literal text or a template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn default_status() -> u16 {
    200
}

impl Default for MockConfiguration {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: Vec::new(),
            content: None,
        }
    }
}

impl MockConfiguration {
    /// Load configuration from a YAML (or JSON) file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }

    /// Content to render, if any. Empty content counts as none.
    pub fn body_template(&self) -> Option<&str> {
        self.content.as_deref().filter(|content| !content.is_empty())
    }

    /// Headers whose name is non-empty after trimming.
    pub fn effective_headers(&self) -> impl Iterator<Item = &HttpHeader> {
        self.headers.iter().filter(|h| !h.name.trim().is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Wrap the serialized configuration as a named policy.
    pub fn to_policy(&self) -> serde_json::Result<PolicyDescriptor> {
        Ok(PolicyDescriptor {
            name: POLICY_NAME.to_string(),
            configuration: self.to_json()?,
        })
    }
}

/// A configured response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// A policy attached to an API operation, its configuration kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDescriptor {
    pub name: String,
    pub configuration: String,
}

impl PolicyDescriptor {
    pub fn mock_configuration(&self) -> serde_json::Result<MockConfiguration> {
        MockConfiguration::from_json(&self.configuration)
    }
}
