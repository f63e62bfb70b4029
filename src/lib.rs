//! Mock Response Policy
//!
//! Answers requests with a synthetic response instead of calling the real
//! backend. The response comes either from an operator-authored
//! configuration or from an API operation's OpenAPI schema.
//!
//! # Features
//!
//! - **Static or templated responses**: status, headers and body, with
//!   Handlebars templates evaluated against the inbound request
//! - **Schema-driven examples**: walks OpenAPI v2/v3 schemas (objects,
//!   arrays, `$ref`, `allOf`, enums, examples) to synthesize a body
//! - **Content type sniffing**: JSON, XML or plain text when no
//!   `Content-Type` is configured
//!
//! # Example Configuration
//!
//! ```yaml
//! status: 200
//! headers:
//!   - name: X-Mocked-Path
//!     value: "{{request.path}}"
//! content: |
//!   {"message": "Hello, {{request.params.name}}!"}
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod example;
pub mod fabricator;
pub mod host;
pub mod openapi;
pub mod policy;
pub mod schema;
pub mod sniff;
pub mod template;

pub use builder::ResponseConfigBuilder;
pub use config::MockConfiguration;
pub use openapi::ApiDefinition;
pub use policy::MockPolicy;
