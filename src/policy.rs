//! The mock policy.
//!
//! On request, the policy installs a [`MockInvoker`] as the backend for the
//! current request. The invoker drains the inbound body, then fabricates
//! the configured response instead of calling upstream.

use crate::config::MockConfiguration;
use crate::fabricator::Fabrication;
use crate::host::{BodyStream, ExecutionContext, Invoker, RequestHead, ResponseSink};
use crate::template::{EvaluationContext, TemplateEngine, TemplateEvaluator};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Mock policy
///
/// Replaces the backend call of every request it sees with a response
/// built from one shared [`MockConfiguration`].
pub struct MockPolicy {
    invoker: Arc<MockInvoker>,
}

impl MockPolicy {
    /// Create a policy evaluating templates with Handlebars.
    pub fn new(configuration: MockConfiguration) -> Self {
        Self::with_evaluator(configuration, Arc::new(TemplateEngine::new()))
    }

    pub fn with_evaluator(
        configuration: MockConfiguration,
        evaluator: Arc<dyn TemplateEvaluator>,
    ) -> Self {
        info!(
            status = configuration.status,
            headers = configuration.headers.len(),
            has_content = configuration.body_template().is_some(),
            "Mock policy initialized"
        );

        Self {
            invoker: Arc::new(MockInvoker {
                configuration: Arc::new(configuration),
                evaluator,
            }),
        }
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let config: MockConfiguration = serde_yaml::from_str(yaml)?;
        Ok(Self::new(config))
    }

    pub fn configuration(&self) -> &MockConfiguration {
        &self.invoker.configuration
    }

    /// Install the mock as the backend of the current request.
    pub fn on_request(&self, context: &mut ExecutionContext) {
        context.set_invoker(self.invoker.clone());
    }
}

/// Backend that answers with the fabricated mock response.
pub struct MockInvoker {
    configuration: Arc<MockConfiguration>,
    evaluator: Arc<dyn TemplateEvaluator>,
}

#[async_trait]
impl Invoker for MockInvoker {
    async fn invoke(
        &self,
        head: &RequestHead,
        body: &mut dyn BodyStream,
        sink: &mut dyn ResponseSink,
    ) {
        // The response is only produced once the inbound stream has ended.
        let content = drain(body).await;
        let context = EvaluationContext::new(head, content.as_deref());
        let evaluator = self.evaluator.as_ref();

        let completed = Fabrication::new(&self.configuration)
            .compose_headers(evaluator, &context)
            .compose_body(evaluator, &context)
            .deliver(sink);

        debug!(
            method = %head.method,
            path = %head.path,
            status = completed.status(),
            body_length = ?completed.body_length(),
            "Mock response delivered"
        );
    }
}

/// Buffer the whole inbound body. `None` when the request carried no chunk.
async fn drain(body: &mut dyn BodyStream) -> Option<Vec<u8>> {
    let mut buffer: Option<Vec<u8>> = None;
    while let Some(chunk) = body.read_chunk().await {
        buffer.get_or_insert_with(Vec::new).extend_from_slice(&chunk);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ResponseConfigBuilder;
    use crate::error::TemplateError;
    use crate::host::{EmptyBody, RecordedResponse};
    use crate::openapi::ApiDefinition;

    struct AlwaysFails;

    impl TemplateEvaluator for AlwaysFails {
        fn evaluate(&self, template: &str, _: &EvaluationContext) -> Result<String, TemplateError> {
            Err(TemplateError::evaluation(template, "no such variable"))
        }
    }

    async fn invoke(policy: &MockPolicy, head: RequestHead, chunks: Vec<Vec<u8>>) -> RecordedResponse {
        let mut context = ExecutionContext::new();
        policy.on_request(&mut context);
        let invoker = context.invoker().expect("invoker installed");

        let mut body = chunks.into_iter();
        let mut sink = RecordedResponse::default();
        invoker.invoke(&head, &mut body, &mut sink).await;
        sink
    }

    fn test_policy() -> MockPolicy {
        let yaml = r#"
status: 201
headers:
  - name: X-Echo-Method
    value: "{{request.method}}"
  - name: X-Missing
    value: "{{request.headers.absent}}"
content: '{"received": "{{request.json.name}}", "path": "{{request.path}}"}'
"#;
        MockPolicy::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_request_body_is_available_to_template() {
        let policy = test_policy();
        let head = RequestHead::new("POST", "/users");
        let sink = invoke(
            &policy,
            head,
            vec![br#"{"na"#.to_vec(), br#"me":"Ada"}"#.to_vec()],
        )
        .await;

        assert_eq!(sink.status, Some(201));
        assert_eq!(sink.body_text(), r#"{"received": "Ada", "path": "/users"}"#);
        assert_eq!(sink.headers.get("X-Echo-Method"), Some("POST"));
        assert!(!sink.headers.contains("X-Missing"));
        assert_eq!(sink.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(
            sink.headers.get("Content-Length"),
            Some(sink.body_bytes().len().to_string().as_str())
        );
        assert!(sink.ended);
    }

    #[tokio::test]
    async fn test_missing_body_data_yields_500() {
        let policy = test_policy();
        let sink = invoke(&policy, RequestHead::new("GET", "/users"), vec![]).await;

        assert_eq!(sink.status, Some(500));
        assert!(sink.body_text().contains("Unable to evaluate template"));
        assert!(sink.ended);
    }

    #[tokio::test]
    async fn test_evaluation_failure_overrides_status() {
        let config = MockConfiguration {
            status: 302,
            headers: vec![],
            content: Some("anything".into()),
        };
        let policy = MockPolicy::with_evaluator(config, Arc::new(AlwaysFails));
        let sink = invoke(&policy, RequestHead::new("GET", "/"), vec![]).await;

        assert_eq!(sink.status, Some(500));
        assert_eq!(
            sink.body_text(),
            TemplateError::evaluation("anything", "no such variable").to_string()
        );
    }

    #[tokio::test]
    async fn test_no_content_means_no_body() {
        let yaml = r#"
status: 204
headers:
  - name: X-A
    value: a
  - name: X-B
    value: b
"#;
        let policy = MockPolicy::from_yaml(yaml).unwrap();
        let sink = invoke(&policy, RequestHead::new("DELETE", "/pets/1"), vec![b"ignored".to_vec()]).await;

        assert_eq!(sink.status, Some(204));
        assert_eq!(sink.headers.len(), 2);
        assert!(!sink.headers.contains("Content-Length"));
        assert!(!sink.headers.contains("Content-Type"));
        assert!(sink.chunks.is_empty());
        assert!(sink.ended);
    }

    #[tokio::test]
    async fn test_waits_for_inbound_stream_end() {
        let policy = MockPolicy::new(MockConfiguration {
            content: Some("{{request.content}}".into()),
            ..Default::default()
        });
        let mut context = ExecutionContext::new();
        policy.on_request(&mut context);
        let invoker = context.invoker().unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(4);
        let task = tokio::spawn(async move {
            let mut sink = RecordedResponse::default();
            invoker
                .invoke(&RequestHead::new("PUT", "/stream"), &mut rx, &mut sink)
                .await;
            sink
        });

        tx.send(b"part one, ".to_vec()).await.unwrap();
        tx.send(b"part two".to_vec()).await.unwrap();
        drop(tx);

        let sink = task.await.unwrap();
        assert_eq!(sink.body_text(), "part one, part two");
        assert_eq!(sink.headers.get("Content-Type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_configuration() {
        let policy = Arc::new(MockPolicy::new(MockConfiguration {
            content: Some("<path>{{request.path}}</path>".into()),
            ..Default::default()
        }));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let policy = policy.clone();
                tokio::spawn(async move {
                    let mut context = ExecutionContext::new();
                    policy.on_request(&mut context);
                    let invoker = context.invoker().unwrap();
                    let mut sink = RecordedResponse::default();
                    invoker
                        .invoke(&RequestHead::new("GET", format!("/r/{}", i)), &mut EmptyBody, &mut sink)
                        .await;
                    (i, sink)
                })
            })
            .collect();

        for handle in handles {
            let (i, sink) = handle.await.unwrap();
            assert_eq!(sink.body_text(), format!("<path>/r/{}</path>", i));
            assert_eq!(sink.headers.get("Content-Type"), Some("text/xml"));
        }
    }

    #[tokio::test]
    async fn test_generated_configuration_end_to_end() {
        let yaml = r##"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets/{id}:
    get:
      responses:
        200:
          description: ok
          schema:
            $ref: "#/definitions/Pet"
definitions:
  Pet:
    type: object
    properties:
      name:
        type: string
      tag:
        type: string
        example: "good boy"
"##;
        let api: ApiDefinition = yaml.parse().unwrap();
        let operation = api.operation("/pets/{id}", "GET").unwrap();
        let config = ResponseConfigBuilder::new()
            .build(api.definitions(), &operation.responses)
            .unwrap();

        let policy = MockPolicy::new(config);
        let sink = invoke(&policy, RequestHead::new("GET", "/pets/1"), vec![]).await;

        assert_eq!(sink.status, Some(200));
        assert_eq!(sink.body_text(), r#"{"name":"Mocked string","tag":"good boy"}"#);
        assert_eq!(sink.headers.get("content-type"), Some("application/json"));
    }
}
