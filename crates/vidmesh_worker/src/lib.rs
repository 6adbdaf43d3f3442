//! Worker side of the video pipeline.
//!
//! Each worker is a ROUTER socket serving one capability ([`server`]). The
//! gateway and the generation worker reach workers through the
//! [`channel::WorkerChannel`] seam. External engines (speech-to-text,
//! detection, rendering) sit behind the traits in [`engines`].

pub mod channel;
pub mod engines;
pub mod resolver;
pub mod server;
pub mod services;

pub use channel::{RpcError, WorkerChannel, WorkerClient, ZmqChannel};
pub use engines::{
    CommandDetector, CommandRenderer, CommandSpeechToText, Detection, ObjectDetector,
    ReportDocument, ReportRenderer, SpeechToText, Summarizer, TruncatingSummarizer,
};
pub use resolver::{ArtifactText, DependencyResolver, ResolvedArtifacts};
pub use server::{reply, respond, LocalChannel, Service, WorkerHandle, WorkerServer};
pub use services::{
    directive_reply, format_vision_section, GenerationService, IntentService, TranscriptionService,
    VisionService,
};

use thiserror::Error;
use vidmesh_intent::IntentError;
use vidmesh_protocol::error::ProtocolError;
use vidmesh_protocol::{ErrorKind, ErrorPayload};

/// Failure while serving one request. Converted to an `Err` reply, never
/// fatal to the server loop.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine failed: {0}")]
    Engine(#[from] anyhow::Error),

    #[error("Intent resolution failed: {0}")]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ServiceError::Protocol(
                ProtocolError::InvalidFileRef { .. }
                | ProtocolError::UnsupportedFormat(_)
                | ProtocolError::JsonError(_),
            ) => ErrorKind::InvalidArgument,
            ServiceError::Intent(IntentError::InvalidSession(_)) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Internal,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.kind(), self.to_string())
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ServiceError::from(ProtocolError::UnsupportedFormat("docx".into())).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ServiceError::from(anyhow::anyhow!("engine crashed")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
