use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vidmesh_intent::{Clarifier, Directive, SessionId};
use vidmesh_protocol::{ClarifyReply, ClarifyRequest, Message, OpCode};

use crate::server::{reply, Service};
use crate::ServiceError;

/// Longest query the intent worker will classify.
pub const MAX_QUERY_CHARS: usize = 2000;

/// Answers `ClarifyQuery` with the resolved directive.
pub struct IntentService {
    clarifier: Arc<Clarifier>,
}

impl IntentService {
    pub fn new(clarifier: Arc<Clarifier>) -> Self {
        Self { clarifier }
    }

    pub fn clarifier(&self) -> &Clarifier {
        &self.clarifier
    }

    fn session(request: &ClarifyRequest) -> Result<Option<SessionId>, ServiceError> {
        match request.session_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }
}

/// Wire form of a directive.
pub fn directive_reply(directive: Directive) -> ClarifyReply {
    ClarifyReply {
        selected_option: Some(directive.kind.as_str().to_string()),
        message: Some(directive.message),
        options: directive.options,
    }
}

#[async_trait]
impl Service for IntentService {
    fn name(&self) -> &'static str {
        "intent"
    }

    fn opcode(&self) -> OpCode {
        OpCode::ClarifyQuery
    }

    async fn handle(&self, request: &Message) -> Result<Message, ServiceError> {
        let body: ClarifyRequest = request.decode()?;
        let session = Self::session(&body)?;

        if body.query.chars().count() > MAX_QUERY_CHARS {
            return Err(ServiceError::InvalidArgument(format!(
                "query longer than {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let directive = if body.query.trim().is_empty() {
            Directive::clarify()
        } else {
            self.clarifier.resolve(&body.query, session).await?.directive
        };
        info!("Clarify {:?} -> {}", body.query, directive.kind);

        reply(request, &directive_reply(directive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::respond;
    use vidmesh_intent::{ClassificationResult, Classify, IntentLabel, ScoredLabel};
    use vidmesh_protocol::{ErrorKind, ErrorPayload, RequestId};

    struct Always(IntentLabel, f32);

    #[async_trait]
    impl Classify for Always {
        async fn classify(&self, _query: &str) -> vidmesh_intent::Result<ClassificationResult> {
            Ok(ClassificationResult::from_scores(vec![ScoredLabel {
                label: self.0,
                confidence: self.1,
            }]))
        }
    }

    fn service(label: IntentLabel, confidence: f32) -> IntentService {
        IntentService::new(Arc::new(Clarifier::new(Arc::new(Always(label, confidence)))))
    }

    fn request(query: &str, session_id: Option<&str>) -> Message {
        Message::encode(
            OpCode::ClarifyQuery,
            RequestId::new(11),
            &ClarifyRequest {
                query: query.to_string(),
                session_id: session_id.map(str::to_string),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_auto_execute_reply_has_no_options() {
        let service = service(IntentLabel::Detect, 0.9);
        let body: ClarifyReply = respond(&service, request("what is in there", None))
            .await
            .decode()
            .unwrap();
        assert_eq!(body.selected_option.as_deref(), Some("detect"));
        assert!(body.options.is_empty());
    }

    #[tokio::test]
    async fn test_format_choice_reply() {
        let service = service(IntentLabel::Generate, 0.7);
        let body: ClarifyReply = respond(&service, request("write it up", None))
            .await
            .decode()
            .unwrap();
        assert_eq!(body.selected_option.as_deref(), Some("ask_generate_format"));
        assert_eq!(body.options, vec!["PDF", "PPTX", "Both"]);
    }

    #[tokio::test]
    async fn test_blank_query_gets_default_clarify() {
        let service = service(IntentLabel::Transcribe, 0.99);
        let body: ClarifyReply = respond(&service, request("   ", None)).await.decode().unwrap();
        assert_eq!(body, directive_reply(Directive::clarify()));
        assert_eq!(service.clarifier().memory().session_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_session_id_is_invalid_argument() {
        let service = service(IntentLabel::Transcribe, 0.99);
        let reply = respond(&service, request("transcribe", Some("not-a-uuid"))).await;
        let body: ErrorPayload = reply.decode().unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_session_id_keys_memory() {
        let service = service(IntentLabel::Detect, 0.3);
        let session = SessionId::new().to_string();
        respond(&service, request("hmm", Some(&session))).await;
        respond(&service, request("hmm", None)).await;
        assert_eq!(service.clarifier().memory().session_count(), 2);
    }

    #[tokio::test]
    async fn test_overlong_query_rejected() {
        let service = service(IntentLabel::Detect, 0.9);
        let reply = respond(&service, request(&"a".repeat(MAX_QUERY_CHARS + 1), None)).await;
        let body: ErrorPayload = reply.decode().unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidArgument);
    }
}
