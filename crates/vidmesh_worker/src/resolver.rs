//! Dependency resolution for report generation.
//!
//! A report needs the transcript and the vision summary. Whatever is missing
//! is requested from the owning worker, one at a time, transcript first.
//! Nothing here fails: an unreachable worker yields a placeholder and a worker
//! error yields a short `Error: ..` line, both marked as degraded.

use std::path::Path;
use tracing::{info, warn};
use vidmesh_protocol::defaults::{NO_TRANSCRIPT_PLACEHOLDER, NO_VISION_PLACEHOLDER};
use vidmesh_protocol::{vision_summary_text, ArtifactKind, ArtifactStore, FileRef};

use crate::channel::{RpcError, WorkerClient};
use crate::truncate_chars;

/// Longest worker error message carried into a report.
const ERROR_TEXT_MAX_CHARS: usize = 200;

/// Text for one report section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactText {
    /// The artifact exists (or was just produced).
    Present(String),
    /// A stand-in value; `reason` says why the real text is missing.
    Degraded { text: String, reason: String },
}

impl ArtifactText {
    pub fn text(&self) -> &str {
        match self {
            ArtifactText::Present(text) => text,
            ArtifactText::Degraded { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ArtifactText::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifacts {
    pub transcript: ArtifactText,
    pub vision: ArtifactText,
}

pub struct DependencyResolver {
    store: ArtifactStore,
    transcriber: WorkerClient,
    detector: WorkerClient,
}

impl DependencyResolver {
    pub fn new(store: ArtifactStore, transcriber: WorkerClient, detector: WorkerClient) -> Self {
        Self {
            store,
            transcriber,
            detector,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Make sure both inputs of a report are available.
    ///
    /// `input` is forwarded verbatim to the upstream workers.
    pub async fn ensure_artifacts(&self, file: &FileRef, input: &Path) -> ResolvedArtifacts {
        let input = input.to_string_lossy();

        let transcript = match self.existing(file, ArtifactKind::Transcript) {
            Some(text) => ArtifactText::Present(text),
            None => {
                info!("Transcript for {} missing, calling {}", file, self.transcriber.target());
                let fetched = self
                    .transcriber
                    .transcribe_video(&input)
                    .await
                    .map(|reply| reply.transcript);
                self.settle(file, ArtifactKind::Transcript, fetched, NO_TRANSCRIPT_PLACEHOLDER)
            }
        };

        let vision = match self.existing(file, ArtifactKind::VisionSummary) {
            Some(text) => ArtifactText::Present(text),
            None => {
                info!("Vision summary for {} missing, calling {}", file, self.detector.target());
                let fetched = self
                    .detector
                    .analyze_video(&input)
                    .await
                    .map(|reply| vision_summary_text(&reply.objects));
                self.settle(file, ArtifactKind::VisionSummary, fetched, NO_VISION_PLACEHOLDER)
            }
        };

        ResolvedArtifacts { transcript, vision }
    }

    /// Non-empty artifact text already on disk.
    fn existing(&self, file: &FileRef, kind: ArtifactKind) -> Option<String> {
        match self.store.read_text(file, kind) {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read {} for {}: {}", kind, file, e);
                None
            }
        }
    }

    /// Turn the outcome of an upstream call into section text.
    ///
    /// The worker writes its own artifact; prefer that copy and fall back to
    /// the reply payload when the artifact is not visible from here.
    fn settle(
        &self,
        file: &FileRef,
        kind: ArtifactKind,
        fetched: Result<String, RpcError>,
        placeholder: &str,
    ) -> ArtifactText {
        match fetched {
            Ok(payload) => {
                let text = self.existing(file, kind).unwrap_or(payload);
                if text.trim().is_empty() {
                    ArtifactText::Degraded {
                        text: placeholder.to_string(),
                        reason: format!("{} worker returned nothing", kind),
                    }
                } else {
                    ArtifactText::Present(text)
                }
            }
            Err(RpcError::Remote(err)) => {
                warn!("{} worker failed for {}: {}", kind, file, err.message);
                ArtifactText::Degraded {
                    text: format!("Error: {}", truncate_chars(&err.message, ERROR_TEXT_MAX_CHARS)),
                    reason: err.message,
                }
            }
            Err(e) => {
                warn!("{} worker unreachable for {}: {}", kind, file, e);
                ArtifactText::Degraded {
                    text: placeholder.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}
