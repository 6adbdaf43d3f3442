//! Payload types carried inside protocol messages, plus the identifiers the
//! gateway and the workers share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::naming::safe_upload_name;

// ============================================================================
// Identifiers
// ============================================================================

/// Correlates a request with its reply on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque name of an uploaded input: `<uniqueness token>_<sanitized name>`.
///
/// A `FileRef` never contains a path separator, so joining it onto the
/// uploads directory cannot escape it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    /// Mint a fresh reference for a newly uploaded file.
    pub fn for_upload(original_name: &str) -> Self {
        Self(format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            safe_upload_name(original_name)
        ))
    }

    /// Validate a caller-supplied name.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: &str| ProtocolError::InvalidFileRef {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(invalid("path separators are not allowed"));
        }
        if name.starts_with('.') || name.contains("..") {
            return Err(invalid("relative path components are not allowed"));
        }
        Ok(Self(name.to_string()))
    }

    /// Recover the reference from a full path handed to a worker.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProtocolError::InvalidFileRef {
                name: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        Self::parse(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base identifier every artifact of this input is keyed by.
    pub fn stem(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.0,
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileRef {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ============================================================================
// Artifacts and formats
// ============================================================================

/// Side effects produced by workers, addressed by `(FileRef, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Transcript,
    VisionSummary,
    Report,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Transcript => "transcript",
            ArtifactKind::VisionSummary => "vision_summary",
            ArtifactKind::Report => "report",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output formats accepted for a generated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Pptx,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 2] = [ReportFormat::Pdf, ReportFormat::Pptx];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Pptx => "pptx",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Worker-side parsing: blank means PDF and `ppt` is read as PPTX.
    pub fn parse_lenient(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "pdf" => Ok(ReportFormat::Pdf),
            "ppt" | "pptx" => Ok(ReportFormat::Pptx),
            other => Err(ProtocolError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strict allow-list used at the gateway boundary: exactly `pdf` or `pptx`.
impl FromStr for ReportFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pdf" => Ok(ReportFormat::Pdf),
            "pptx" => Ok(ReportFormat::Pptx),
            other => Err(ProtocolError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Payload for OpCode.TRANSCRIBE_VIDEO and OpCode.ANALYZE_VIDEO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub file_path: String,
}

/// Payload for OpCode.GENERATE_REPORT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub file_path: String,
    #[serde(default)]
    pub report_type: String,
}

/// Payload for OpCode.CLARIFY_QUERY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyRequest {
    pub query: String,
    /// Conversation the query belongs to; `None` selects the shared default session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

// ============================================================================
// Replies
// ============================================================================

/// Reply to TRANSCRIBE_VIDEO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptReply {
    pub transcript: String,
}

/// Reply to ANALYZE_VIDEO: sorted, de-duplicated labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReply {
    #[serde(default)]
    pub objects: Vec<String>,
}

/// Reply to GENERATE_REPORT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReply {
    pub report_path: String,
}

/// Reply to CLARIFY_QUERY.
///
/// `selected_option` and `message` may be absent or blank on the wire; the
/// receiving side substitutes defaults once, at its boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClarifyReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Internal,
}

/// Payload for OpCode.ERR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Human-readable vision summary as stored in the `.vision.txt` artifact.
pub fn vision_summary_text(objects: &[String]) -> String {
    if objects.is_empty() {
        crate::defaults::NO_OBJECTS_SUMMARY.to_string()
    } else {
        format!(
            "{}\n{}",
            crate::defaults::OBJECTS_SUMMARY_HEADER,
            objects.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_ref_for_upload_keeps_original_name() {
        let file = FileRef::for_upload("talk.mp4");
        let (token, rest) = file.as_str().split_once('_').unwrap();
        assert_eq!(token.len(), 32);
        assert_eq!(rest, "talk.mp4");
        assert!(file.stem().ends_with("_talk"));
    }

    #[test]
    fn test_file_ref_rejects_traversal() {
        assert!(FileRef::parse("../etc/passwd").is_err());
        assert!(FileRef::parse("a/b.mp4").is_err());
        assert!(FileRef::parse("a\\b.mp4").is_err());
        assert!(FileRef::parse("   ").is_err());
        assert!(FileRef::parse("clip.mp4").is_ok());
    }

    #[test]
    fn test_file_ref_from_path() {
        let path = PathBuf::from("/data/uploads/abc_clip.mp4");
        let file = FileRef::from_path(&path).unwrap();
        assert_eq!(file.as_str(), "abc_clip.mp4");
        assert_eq!(file.stem(), "abc_clip");
    }

    #[test]
    fn test_report_format_strict() {
        assert_eq!("pdf".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert_eq!("pptx".parse::<ReportFormat>().unwrap(), ReportFormat::Pptx);
        assert!("ppt".parse::<ReportFormat>().is_err());
        assert!("docx".parse::<ReportFormat>().is_err());
        assert!("PDF".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_report_format_lenient() {
        assert_eq!(ReportFormat::parse_lenient("").unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse_lenient("PPT").unwrap(), ReportFormat::Pptx);
        assert!(ReportFormat::parse_lenient("html").is_err());
    }

    #[test]
    fn test_clarify_reply_missing_fields() {
        let reply: ClarifyReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.selected_option, None);
        assert_eq!(reply.message, None);
        assert!(reply.options.is_empty());
    }

    #[test]
    fn test_vision_summary_text() {
        assert_eq!(vision_summary_text(&[]), "No objects detected.");
        let objects = vec!["car".to_string(), "person".to_string()];
        assert_eq!(
            vision_summary_text(&objects),
            "Objects detected:\ncar\nperson"
        );
    }
}
