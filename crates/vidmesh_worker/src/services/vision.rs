use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use vidmesh_protocol::defaults::DETECTION_SCORE_THRESHOLD;
use vidmesh_protocol::{
    vision_summary_text, AnalysisReply, ArtifactKind, ArtifactStore, Message, OpCode, VideoRequest,
};

use crate::engines::{Detection, ObjectDetector};
use crate::server::{reply, Service};
use crate::ServiceError;

/// Answers `AnalyzeVideo`; writes `<stem>.vision.txt`.
pub struct VisionService {
    detector: Arc<dyn ObjectDetector>,
    store: ArtifactStore,
    threshold: f32,
}

impl VisionService {
    pub fn new(detector: Arc<dyn ObjectDetector>, store: ArtifactStore) -> Self {
        Self {
            detector,
            store,
            threshold: DETECTION_SCORE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Confident labels, sorted and de-duplicated.
    pub fn confident_labels(&self, detections: &[Detection]) -> Vec<String> {
        detections
            .iter()
            .filter(|d| d.score >= self.threshold)
            .map(|d| d.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl Service for VisionService {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn opcode(&self) -> OpCode {
        OpCode::AnalyzeVideo
    }

    async fn handle(&self, request: &Message) -> Result<Message, ServiceError> {
        let body: VideoRequest = request.decode()?;
        let (input, file) = super::require_input(&body.file_path)?;

        let detections = self.detector.detect(&input).await?;
        let objects = self.confident_labels(&detections);

        let summary = vision_summary_text(&objects);
        let written = self
            .store
            .write_text(&file, ArtifactKind::VisionSummary, &summary)?;
        info!(
            "Vision summary for {} saved to {} ({} of {} detections kept)",
            file,
            written.display(),
            objects.len(),
            detections.len()
        );

        reply(request, &AnalysisReply { objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::respond;
    use std::path::Path;
    use tempfile::TempDir;
    use vidmesh_protocol::{ErrorKind, ErrorPayload, FileRef, RequestId};

    struct FixedDetector(Vec<Detection>);

    #[async_trait]
    impl ObjectDetector for FixedDetector {
        async fn detect(&self, _input: &Path) -> anyhow::Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn request(path: &Path) -> Message {
        Message::encode(
            OpCode::AnalyzeVideo,
            RequestId::new(3),
            &VideoRequest {
                file_path: path.display().to_string(),
            },
        )
        .unwrap()
    }

    fn fixture(detections: Vec<Detection>) -> (TempDir, VisionService, FileRef, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("uploads"), dir.path().join("artifacts"));
        std::fs::create_dir_all(store.uploads_dir()).unwrap();
        let file = FileRef::parse("abc_street.mp4").unwrap();
        let input = store.input_path(&file);
        std::fs::write(&input, b"video").unwrap();
        let service = VisionService::new(Arc::new(FixedDetector(detections)), store);
        (dir, service, file, input)
    }

    #[tokio::test]
    async fn test_labels_filtered_sorted_deduplicated() {
        let (_dir, service, file, input) = fixture(vec![
            Detection::new("person", 0.97),
            Detection::new("car", 0.5),
            Detection::new("person", 0.88),
            Detection::new("dog", 0.49),
            Detection::new("bicycle", 0.73),
        ]);

        let reply = respond(&service, request(&input)).await;
        let body: AnalysisReply = reply.decode().unwrap();
        assert_eq!(body.objects, vec!["bicycle", "car", "person"]);
        assert_eq!(
            service
                .store
                .read_text(&file, ArtifactKind::VisionSummary)
                .unwrap()
                .as_deref(),
            Some("Objects detected:\nbicycle\ncar\nperson")
        );
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let (_dir, service, file, input) = fixture(vec![
            Detection::new("cat", 0.9),
            Detection::new("sofa", 0.6),
            Detection::new("cat", 0.8),
        ]);

        let first: AnalysisReply = respond(&service, request(&input)).await.decode().unwrap();
        let first_text = service.store.read_text(&file, ArtifactKind::VisionSummary).unwrap();
        let second: AnalysisReply = respond(&service, request(&input)).await.decode().unwrap();
        let second_text = service.store.read_text(&file, ArtifactKind::VisionSummary).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_text, second_text);
    }

    #[tokio::test]
    async fn test_nothing_confident() {
        let (_dir, service, file, input) = fixture(vec![Detection::new("kite", 0.1)]);
        let body: AnalysisReply = respond(&service, request(&input)).await.decode().unwrap();
        assert!(body.objects.is_empty());
        assert_eq!(
            service
                .store
                .read_text(&file, ArtifactKind::VisionSummary)
                .unwrap()
                .as_deref(),
            Some("No objects detected.")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (dir, service, _file, _input) = fixture(vec![]);
        let reply = respond(&service, request(&dir.path().join("uploads/gone.mp4"))).await;
        let body: ErrorPayload = reply.decode().unwrap();
        assert_eq!(body.kind, ErrorKind::NotFound);
    }
}
