use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vidmesh_protocol::defaults::{NO_TRANSCRIPT_PLACEHOLDER, NO_VISION_PLACEHOLDER, OBJECTS_SUMMARY_HEADER};
use vidmesh_protocol::{Message, OpCode, ReportFormat, ReportReply, ReportRequest};

use crate::engines::{ReportDocument, ReportRenderer, Summarizer};
use crate::resolver::{ArtifactText, DependencyResolver};
use crate::server::{reply, Service};
use crate::ServiceError;

/// Answers `GenerateReport`: resolve inputs, summarize, render.
pub struct GenerationService {
    resolver: DependencyResolver,
    summarizer: Arc<dyn Summarizer>,
    renderer: Arc<dyn ReportRenderer>,
}

impl GenerationService {
    pub fn new(
        resolver: DependencyResolver,
        summarizer: Arc<dyn Summarizer>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            resolver,
            summarizer,
            renderer,
        }
    }

    fn transcript_section(&self, transcript: &ArtifactText) -> String {
        match transcript {
            ArtifactText::Present(text) => {
                let summary = self.summarizer.summarize(text);
                if summary.trim().is_empty() {
                    NO_TRANSCRIPT_PLACEHOLDER.to_string()
                } else {
                    summary
                }
            }
            // Stand-ins are shown verbatim
            ArtifactText::Degraded { text, .. } => text.clone(),
        }
    }
}

/// Turn the stored vision summary into the report's vision section:
/// `Objects detected:` followed by one `• label` line per object.
pub fn format_vision_section(vision_summary: &str) -> String {
    match vision_summary.split_once(OBJECTS_SUMMARY_HEADER) {
        Some((_, labels)) => {
            let bullets: Vec<String> = labels
                .lines()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(|label| format!("• {}", label))
                .collect();
            format!("{}\n{}", OBJECTS_SUMMARY_HEADER, bullets.join("\n"))
        }
        None => {
            let trimmed = vision_summary.trim();
            if trimmed.is_empty() {
                NO_VISION_PLACEHOLDER.to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[async_trait]
impl Service for GenerationService {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn opcode(&self) -> OpCode {
        OpCode::GenerateReport
    }

    async fn handle(&self, request: &Message) -> Result<Message, ServiceError> {
        let body: ReportRequest = request.decode()?;
        let format = ReportFormat::parse_lenient(&body.report_type)?;
        let (input, file) = super::locate_input(&body.file_path)?;

        let resolved = self.resolver.ensure_artifacts(&file, &input).await;
        if resolved.transcript.is_degraded() || resolved.vision.is_degraded() {
            info!(
                "Report for {} uses stand-ins (transcript degraded: {}, vision degraded: {})",
                file,
                resolved.transcript.is_degraded(),
                resolved.vision.is_degraded()
            );
        }

        let document = ReportDocument::new(
            self.transcript_section(&resolved.transcript),
            format_vision_section(resolved.vision.text()),
        );

        let store = self.resolver.store();
        std::fs::create_dir_all(store.artifacts_dir())
            .map_err(vidmesh_protocol::error::ProtocolError::from)?;
        let output = store.report_path(&file, format);
        self.renderer.render(&document, format, &output).await?;
        info!("{} summary saved: {}", format.as_str().to_uppercase(), output.display());

        reply(
            request,
            &ReportReply {
                report_path: output.display().to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_vision_section_bullets() {
        assert_eq!(
            format_vision_section("Objects detected:\ncar\nperson\n"),
            "Objects detected:\n• car\n• person"
        );
    }

    #[test]
    fn test_format_vision_section_passthrough() {
        assert_eq!(format_vision_section("No objects detected."), "No objects detected.");
        assert_eq!(format_vision_section("  "), "No visual data available.");
        assert_eq!(
            format_vision_section("No visual data available."),
            "No visual data available."
        );
    }
}
