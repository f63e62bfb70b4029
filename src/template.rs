//! Template evaluation for mock headers and bodies.
//!
//! Uses Handlebars in strict mode, so a template referencing data the
//! request does not carry fails instead of rendering an empty string.

use crate::error::TemplateError;
use crate::host::RequestHead;
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;
use std::collections::BTreeMap;

/// Evaluates a template string against a request context.
pub trait TemplateEvaluator: Send + Sync {
    fn evaluate(&self, template: &str, context: &EvaluationContext) -> Result<String, TemplateError>;
}

/// Data available to templates, exposed under the `request` variable.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationContext {
    pub request: EvaluableRequest,
}

/// The inbound request as seen from a template.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluableRequest {
    pub method: String,
    pub path: String,
    pub uri: String,
    /// Query parameters
    pub params: BTreeMap<String, String>,
    /// Request headers, first value per name
    pub headers: BTreeMap<String, String>,
    /// Request body (as string, if text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Request body as JSON (if parseable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Milliseconds since the epoch at which the context was built
    pub timestamp: i64,
}

impl EvaluationContext {
    /// Build the context for a request whose body has been fully buffered.
    pub fn new(head: &RequestHead, body: Option<&[u8]>) -> Self {
        let content = body.map(|b| String::from_utf8_lossy(b).into_owned());
        let json = content.as_deref().and_then(|s| serde_json::from_str(s).ok());

        let mut headers = BTreeMap::new();
        for (name, value) in head.headers.iter() {
            headers
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }

        Self {
            request: EvaluableRequest {
                method: head.method.clone(),
                path: head.path.clone(),
                uri: head.uri(),
                params: head.query_params(),
                headers,
                content,
                json,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }
}

/// Handlebars-backed [`TemplateEvaluator`].
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

handlebars_helper!(upper_helper: |value: str| value.to_uppercase());
handlebars_helper!(lower_helper: |value: str| value.to_lowercase());

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        handlebars.register_helper("json", Box::new(json_helper));
        handlebars.register_helper("now", Box::new(now_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));

        // Mock bodies are JSON, XML or text, never HTML.
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEvaluator for TemplateEngine {
    fn evaluate(&self, template: &str, context: &EvaluationContext) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(template, context)
            .map_err(|err| TemplateError::evaluation(template, err))
    }
}

/// Serializes its parameter as compact JSON.
fn json_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h
        .param(0)
        .map(|p| p.value().clone())
        .unwrap_or(serde_json::Value::Null);
    out.write(&serde_json::to_string(&value).unwrap_or_default())?;
    Ok(())
}

fn now_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");

    out.write(&chrono::Utc::now().format(format).to_string())?;
    Ok(())
}
