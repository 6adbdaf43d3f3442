use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vidmesh_protocol::{ArtifactKind, ArtifactStore, Message, OpCode, TranscriptReply, VideoRequest};

use crate::engines::SpeechToText;
use crate::server::{reply, Service};
use crate::ServiceError;

/// Answers `TranscribeVideo`; writes `<stem>.txt` next to the uploads.
pub struct TranscriptionService {
    engine: Arc<dyn SpeechToText>,
    store: ArtifactStore,
}

impl TranscriptionService {
    pub fn new(engine: Arc<dyn SpeechToText>, store: ArtifactStore) -> Self {
        Self { engine, store }
    }
}

#[async_trait]
impl Service for TranscriptionService {
    fn name(&self) -> &'static str {
        "transcription"
    }

    fn opcode(&self) -> OpCode {
        OpCode::TranscribeVideo
    }

    async fn handle(&self, request: &Message) -> Result<Message, ServiceError> {
        let body: VideoRequest = request.decode()?;
        let (input, file) = super::require_input(&body.file_path)?;

        let transcript = self.engine.transcribe(&input).await?;
        let written = self
            .store
            .write_text(&file, ArtifactKind::Transcript, &transcript)?;
        info!(
            "Transcript for {} saved to {} ({} chars)",
            file,
            written.display(),
            transcript.chars().count()
        );

        reply(request, &TranscriptReply { transcript })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::respond;
    use tempfile::TempDir;
    use vidmesh_protocol::{ErrorKind, ErrorPayload, FileRef, RequestId};

    struct FixedSpeech(&'static str);

    #[async_trait]
    impl SpeechToText for FixedSpeech {
        async fn transcribe(&self, _input: &std::path::Path) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenSpeech;

    #[async_trait]
    impl SpeechToText for BrokenSpeech {
        async fn transcribe(&self, _input: &std::path::Path) -> anyhow::Result<String> {
            anyhow::bail!("model missing")
        }
    }

    fn request(path: &std::path::Path) -> Message {
        Message::encode(
            OpCode::TranscribeVideo,
            RequestId::new(1),
            &VideoRequest {
                file_path: path.display().to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transcript_written_and_returned() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("uploads"), dir.path().join("artifacts"));
        std::fs::create_dir_all(store.uploads_dir()).unwrap();
        let file = FileRef::parse("abc_talk.mp4").unwrap();
        let input = store.input_path(&file);
        std::fs::write(&input, b"video").unwrap();

        let service = TranscriptionService::new(Arc::new(FixedSpeech("hello there")), store.clone());
        let reply = respond(&service, request(&input)).await;
        let body: TranscriptReply = reply.decode().unwrap();
        assert_eq!(body.transcript, "hello there");
        assert_eq!(
            store.read_text(&file, ArtifactKind::Transcript).unwrap().as_deref(),
            Some("hello there")
        );

        // Re-invocation overwrites in place
        let service = TranscriptionService::new(Arc::new(FixedSpeech("second take")), store.clone());
        respond(&service, request(&input)).await;
        assert_eq!(
            store.read_text(&file, ArtifactKind::Transcript).unwrap().as_deref(),
            Some("second take")
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("uploads"), dir.path().join("artifacts"));
        let service = TranscriptionService::new(Arc::new(FixedSpeech("x")), store);

        let reply = respond(&service, request(&dir.path().join("uploads/nope.mp4"))).await;
        let body: ErrorPayload = reply.decode().unwrap();
        assert_eq!(body.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_engine_failure_is_internal() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();
        let store = ArtifactStore::new(dir.path(), dir.path().join("artifacts"));
        let service = TranscriptionService::new(Arc::new(BrokenSpeech), store);

        let reply = respond(&service, request(&input)).await;
        assert_eq!(reply.opcode(), OpCode::Err);
        let body: ErrorPayload = reply.decode().unwrap();
        assert_eq!(body.kind, ErrorKind::Internal);
        assert!(body.message.contains("model missing"));
    }
}
