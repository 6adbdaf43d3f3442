//! The four worker capabilities.

mod generation;
mod intent;
mod transcription;
mod vision;

pub use generation::{format_vision_section, GenerationService};
pub use intent::{directive_reply, IntentService, MAX_QUERY_CHARS};
pub use transcription::TranscriptionService;
pub use vision::VisionService;

use std::path::PathBuf;
use vidmesh_protocol::FileRef;

use crate::ServiceError;

/// Resolve a request's `file_path` into the input path and its reference.
pub(crate) fn locate_input(file_path: &str) -> Result<(PathBuf, FileRef), ServiceError> {
    if file_path.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("file_path is empty".to_string()));
    }
    let path = PathBuf::from(file_path);
    let file = FileRef::from_path(&path)?;
    Ok((path, file))
}

/// Like [`locate_input`], but the input must exist.
pub(crate) fn require_input(file_path: &str) -> Result<(PathBuf, FileRef), ServiceError> {
    let (path, file) = locate_input(file_path)?;
    if !path.is_file() {
        return Err(ServiceError::NotFound(format!("File not found: {}", file_path)));
    }
    Ok((path, file))
}
