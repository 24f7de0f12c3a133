//! Audit service facade
//!
//! Normalizes heterogeneous caller inputs (write requests, raw envelopes,
//! stage + metadata) into canonical envelopes and forwards them to the
//! configured publisher.

use std::collections::HashMap;
use std::sync::Arc;

use crate::envelope::{AuditSeverity, AuditWriteRequest, CanonicalEnvelope};
use crate::error::{Error, Result};
use crate::publisher::AuditPublisher;

/// Entry point for publishing audit events
#[derive(Clone)]
pub struct AuditService {
    publisher: Arc<dyn AuditPublisher>,
}

impl AuditService {
    pub fn new(publisher: Arc<dyn AuditPublisher>) -> Self {
        Self { publisher }
    }

    /// Publish a write request with its stated severity
    pub async fn publish_request(&self, request: AuditWriteRequest) -> Result<()> {
        let severity = request.severity;
        self.publish_with_severity(request, severity).await
    }

    /// Publish an already-canonical envelope as-is
    pub async fn publish_envelope(&self, envelope: CanonicalEnvelope) -> Result<()> {
        self.publisher.publish(envelope).await
    }

    /// Publish a write request, forcing INFO severity
    pub async fn publish_info(&self, request: AuditWriteRequest) -> Result<()> {
        self.publish_with_severity(request, AuditSeverity::Info).await
    }

    /// Publish a write request, forcing WARN severity
    pub async fn publish_warn(&self, request: AuditWriteRequest) -> Result<()> {
        self.publish_with_severity(request, AuditSeverity::Warn).await
    }

    /// Publish a write request, forcing ERROR severity
    ///
    /// Fails when the request carries no error map; an error-severity event
    /// without error details is a caller bug.
    pub async fn publish_error(&self, request: AuditWriteRequest) -> Result<()> {
        if request.error.is_empty() {
            return Err(Error::Validation(
                "errorMap is required for publish_error".into(),
            ));
        }
        self.publish_with_severity(request, AuditSeverity::Error).await
    }

    /// Convenience path for stage + metadata callers
    ///
    /// `conversation_id` stays mandatory to preserve the correlation and
    /// idempotency contracts.
    pub async fn publish_stage(
        &self,
        stage: &str,
        conversation_id: &str,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        if stage.trim().is_empty() {
            return Err(Error::Validation("stage is required".into()));
        }
        if conversation_id.trim().is_empty() {
            return Err(Error::Validation("conversationId is required".into()));
        }

        let mut request = AuditWriteRequest::new(stage).with_conversation_id(conversation_id);
        if let Some(metadata) = metadata {
            request = request.with_extra_map(metadata);
        }

        self.publish_info(request).await
    }

    async fn publish_with_severity(
        &self,
        request: AuditWriteRequest,
        severity: AuditSeverity,
    ) -> Result<()> {
        self.publisher.publish(request.into_envelope(severity)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::AuditSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingPublisher {
        published: Mutex<Vec<CanonicalEnvelope>>,
    }

    #[async_trait]
    impl AuditPublisher for CapturingPublisher {
        async fn publish(&self, envelope: CanonicalEnvelope) -> Result<()> {
            self.published.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    fn service() -> (AuditService, Arc<CapturingPublisher>) {
        let publisher = Arc::new(CapturingPublisher::default());
        (AuditService::new(publisher.clone()), publisher)
    }

    fn request() -> AuditWriteRequest {
        AuditWriteRequest::new("order.created")
            .with_source(AuditSource::Api)
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1")
    }

    #[tokio::test]
    async fn test_publish_request_keeps_stated_severity() {
        let (service, publisher) = service();
        service
            .publish_request(request().with_severity(AuditSeverity::Warn))
            .await
            .unwrap();

        assert_eq!(
            publisher.published.lock().unwrap()[0].severity,
            AuditSeverity::Warn
        );
    }

    #[tokio::test]
    async fn test_severity_forcing_variants_override_request() {
        let (service, publisher) = service();

        service
            .publish_warn(request().with_severity(AuditSeverity::Info))
            .await
            .unwrap();
        service
            .publish_error(
                request()
                    .with_severity(AuditSeverity::Info)
                    .with_error_entry("message", serde_json::json!("boom")),
            )
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].severity, AuditSeverity::Warn);
        assert_eq!(published[1].severity, AuditSeverity::Error);
    }

    #[tokio::test]
    async fn test_publish_error_requires_error_map() {
        let (service, publisher) = service();
        let result = service.publish_error(request()).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_stage_requires_stage_and_conversation() {
        let (service, _) = service();

        let blank_stage = service
            .publish_stage("  ", "6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1", None)
            .await;
        assert!(matches!(blank_stage, Err(Error::Validation(_))));

        let blank_conversation = service.publish_stage("order.created", "", None).await;
        assert!(matches!(blank_conversation, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_publish_stage_merges_metadata_into_extra() {
        let (service, publisher) = service();
        let metadata = HashMap::from([("step".to_string(), serde_json::json!("checkout"))]);

        service
            .publish_stage(
                "order.created",
                "6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1",
                Some(metadata),
            )
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].severity, AuditSeverity::Info);
        assert_eq!(published[0].source, AuditSource::Other);
        assert_eq!(published[0].extra["step"], serde_json::json!("checkout"));
    }
}
