//! Per-request response fabrication.
//!
//! A [`Fabrication`] moves through `Idle -> HeadersComposed -> BodyReady ->
//! Completed`, each transition consuming the previous state. Without
//! configured content, `HeadersComposed` completes directly and no body is
//! delivered.

use crate::config::MockConfiguration;
use crate::host::{Headers, ResponseSink};
use crate::sniff;
use crate::template::{EvaluationContext, TemplateEvaluator};
use tracing::{debug, warn};

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";
const INTERNAL_SERVER_ERROR: u16 = 500;

/// Nothing composed yet.
#[derive(Debug)]
pub struct Idle;

/// Status and headers are final unless the body fails to evaluate.
#[derive(Debug)]
pub struct HeadersComposed;

/// Body evaluated, `Content-Length` and `Content-Type` set.
#[derive(Debug)]
pub struct BodyReady {
    body: Vec<u8>,
}

/// Response delivered to the sink.
#[derive(Debug)]
pub struct Completed {
    body_length: Option<usize>,
}

/// Fabrication of one response from a shared configuration.
#[derive(Debug)]
pub struct Fabrication<'a, S> {
    config: &'a MockConfiguration,
    status: u16,
    headers: Headers,
    state: S,
}

impl<S> Fabrication<'_, S> {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl<'a> Fabrication<'a, Idle> {
    pub fn new(config: &'a MockConfiguration) -> Self {
        Self {
            config,
            status: config.status,
            headers: Headers::new(),
            state: Idle,
        }
    }

    /// Evaluate configured headers. A header that fails to evaluate is dropped.
    pub fn compose_headers(
        mut self,
        evaluator: &dyn TemplateEvaluator,
        context: &EvaluationContext,
    ) -> Fabrication<'a, HeadersComposed> {
        for header in self.config.effective_headers() {
            let Some(template) = header.value.as_deref() else {
                continue;
            };
            match evaluator.evaluate(template, context) {
                Ok(value) => self.headers.set(header.name.as_str(), value),
                Err(err) => {
                    warn!(header = %header.name, error = %err, "Dropping mock header");
                }
            }
        }

        debug!(status = self.status, headers = self.headers.len(), "Headers composed");
        Fabrication {
            config: self.config,
            status: self.status,
            headers: self.headers,
            state: HeadersComposed,
        }
    }
}

/// Outcome of body composition.
#[derive(Debug)]
pub enum BodyStep<'a> {
    /// A body was produced
    Ready(Fabrication<'a, BodyReady>),
    /// No content is configured
    Empty(Fabrication<'a, HeadersComposed>),
}

impl<'a> BodyStep<'a> {
    /// Deliver the response, with or without a body.
    pub fn deliver(self, sink: &mut dyn ResponseSink) -> Fabrication<'a, Completed> {
        match self {
            BodyStep::Ready(ready) => ready.deliver(sink),
            BodyStep::Empty(composed) => composed.complete(sink),
        }
    }
}

impl<'a> Fabrication<'a, HeadersComposed> {
    /// Evaluate the configured content.
    ///
    /// An evaluation failure replaces the body with the failure description
    /// and forces a `500` status.
    pub fn compose_body(
        mut self,
        evaluator: &dyn TemplateEvaluator,
        context: &EvaluationContext,
    ) -> BodyStep<'a> {
        let Some(template) = self.config.body_template() else {
            return BodyStep::Empty(self);
        };

        let text = match evaluator.evaluate(template, context) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Mock content evaluation failed");
                self.status = INTERNAL_SERVER_ERROR;
                err.to_string()
            }
        };

        let body = text.into_bytes();
        self.headers.set(CONTENT_LENGTH, body.len().to_string());
        if !self.headers.contains(CONTENT_TYPE) {
            // Sniff the template, not the rendered output.
            let kind = sniff::classify(template);
            self.headers.set(CONTENT_TYPE, kind.media_type());
        }

        debug!(status = self.status, length = body.len(), "Body composed");
        BodyStep::Ready(Fabrication {
            config: self.config,
            status: self.status,
            headers: self.headers,
            state: BodyReady { body },
        })
    }

    /// Complete without a body.
    pub fn complete(self, sink: &mut dyn ResponseSink) -> Fabrication<'a, Completed> {
        sink.head(self.status, &self.headers);
        sink.end();
        Fabrication {
            config: self.config,
            status: self.status,
            headers: self.headers,
            state: Completed { body_length: None },
        }
    }
}

impl<'a> Fabrication<'a, BodyReady> {
    pub fn body(&self) -> &[u8] {
        &self.state.body
    }

    /// Send head, body and end to the sink.
    pub fn deliver(self, sink: &mut dyn ResponseSink) -> Fabrication<'a, Completed> {
        let length = self.state.body.len();
        sink.head(self.status, &self.headers);
        sink.body(self.state.body);
        sink.end();
        Fabrication {
            config: self.config,
            status: self.status,
            headers: self.headers,
            state: Completed {
                body_length: Some(length),
            },
        }
    }
}

impl Fabrication<'_, Completed> {
    /// Length of the delivered body, `None` when no body was sent.
    pub fn body_length(&self) -> Option<usize> {
        self.state.body_length
    }
}
