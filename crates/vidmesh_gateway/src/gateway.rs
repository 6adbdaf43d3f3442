//! The externally facing router.
//!
//! Every action is validated here before any worker is contacted: the file
//! must exist and the report format must be on the allow-list. Each request
//! and its outcome is written to the audit sink before returning.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vidmesh_intent::{
    Directive, DirectiveKind, SessionId, CANONICAL_OPTIONS, DEFAULT_CLARIFY_MESSAGE,
};
use vidmesh_protocol::defaults::{CLARIFY_TIMEOUT_SECS, NO_OBJECTS_SUMMARY};
use vidmesh_protocol::{ArtifactStore, ClarifyReply, FileRef, ReportFormat, SystemConfig};
use vidmesh_worker::services::MAX_QUERY_CHARS;
use vidmesh_worker::{truncate_chars, RpcError, WorkerClient};

use crate::audit::{AuditEntry, AuditRole, AuditSink};
use crate::error::{GatewayError, Result};

/// Only this extension is accepted on upload.
pub const UPLOAD_EXTENSION: &str = "mp4";

/// How much of a transcript goes into the audit log.
const TRANSCRIPT_AUDIT_CHARS: usize = 500;

/// A direct action on an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Transcribe,
    Detect,
    /// `format` is checked against the allow-list (`pdf` / `pptx`).
    Generate { format: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Transcript(String),
    Objects(Vec<String>),
    Report(String),
}

/// One client per worker role.
#[derive(Clone)]
pub struct WorkerSet {
    pub transcriber: WorkerClient,
    pub detector: WorkerClient,
    pub generator: WorkerClient,
    pub intent: WorkerClient,
}

impl WorkerSet {
    /// ZeroMQ clients for the configured addresses. Only the intent call is
    /// bounded in time.
    pub fn connect(config: &SystemConfig) -> Self {
        Self {
            transcriber: WorkerClient::connect(&config.transcribe_addr),
            detector: WorkerClient::connect(&config.vision_addr),
            generator: WorkerClient::connect(&config.generate_addr),
            intent: WorkerClient::connect_with_timeout(
                &config.intent_addr,
                Duration::from_secs(CLARIFY_TIMEOUT_SECS),
            ),
        }
    }
}

pub struct Gateway {
    store: ArtifactStore,
    workers: WorkerSet,
    audit: Arc<dyn AuditSink>,
}

impl Gateway {
    pub fn new(store: ArtifactStore, workers: WorkerSet, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            workers,
            audit,
        }
    }

    pub fn from_config(config: &SystemConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self::new(
            ArtifactStore::new(&config.uploads_dir, &config.artifacts_dir),
            WorkerSet::connect(config),
            audit,
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn record(&self, role: AuditRole, text: impl Into<String>) {
        let entry = AuditEntry::now(role, text);
        if let Err(e) = self.audit.append(entry) {
            warn!("Failed to write audit entry: {}", e);
        }
    }

    /// Pass `result` through, logging a rejection to the audit sink.
    fn audited<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.record(AuditRole::System, format!("Rejected: {}", e));
        }
        result
    }

    // ------------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------------

    /// Copy `source` into the uploads directory under a fresh [`FileRef`].
    pub fn upload(&self, source: &Path) -> Result<FileRef> {
        let result = self.store_upload(source);
        self.audited(result)
    }

    fn store_upload(&self, source: &Path) -> Result<FileRef> {
        let original = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GatewayError::InvalidArgument(format!("{} has no file name", source.display())))?;

        let is_mp4 = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(UPLOAD_EXTENSION))
            .unwrap_or(false);
        if !is_mp4 {
            return Err(GatewayError::InvalidArgument("Only .mp4 allowed.".to_string()));
        }
        if !source.is_file() {
            return Err(GatewayError::NotFound(source.display().to_string()));
        }

        let file = FileRef::for_upload(original);
        let dest = self.store.input_path(&file);
        fs::create_dir_all(self.store.uploads_dir())?;
        fs::copy(source, &dest)?;
        info!("Uploaded {} as {}", source.display(), file);

        self.record(AuditRole::User, format!("Uploaded video: {}", file));
        self.record(AuditRole::System, format!("Saved to path: {}", dest.display()));
        Ok(file)
    }

    /// Validate a caller-supplied name and require the upload to exist.
    pub fn resolve_file(&self, name: &str) -> Result<FileRef> {
        let file = FileRef::parse(name)?;
        if !self.store.input_path(&file).is_file() {
            return Err(GatewayError::NotFound(name.to_string()));
        }
        Ok(file)
    }

    // ------------------------------------------------------------------------
    // Direct actions
    // ------------------------------------------------------------------------

    pub async fn invoke(&self, action: Action, name: &str) -> Result<InvocationResult> {
        match action {
            Action::Transcribe => self.transcribe(name).await.map(InvocationResult::Transcript),
            Action::Detect => self.detect(name).await.map(InvocationResult::Objects),
            Action::Generate { format } => self
                .generate(name, &format)
                .await
                .map(InvocationResult::Report),
        }
    }

    pub async fn transcribe(&self, name: &str) -> Result<String> {
        let file = self.audited(self.resolve_file(name))?;
        let input = self.input_arg(&file);

        self.record(AuditRole::User, format!("Transcribing {}", file));
        match self.workers.transcriber.transcribe_video(&input).await {
            Ok(reply) => {
                self.record(AuditRole::Assistant, transcript_audit_text(&reply.transcript));
                Ok(reply.transcript)
            }
            Err(e) => Err(self.upstream_failure("Transcription", e)),
        }
    }

    pub async fn detect(&self, name: &str) -> Result<Vec<String>> {
        let file = self.audited(self.resolve_file(name))?;
        let input = self.input_arg(&file);

        self.record(AuditRole::User, format!("Detecting {}", file));
        match self.workers.detector.analyze_video(&input).await {
            Ok(reply) => {
                self.record(AuditRole::Assistant, objects_audit_text(&reply.objects));
                Ok(reply.objects)
            }
            Err(e) => Err(self.upstream_failure("Vision agent", e)),
        }
    }

    pub async fn generate(&self, name: &str, format: &str) -> Result<String> {
        let file = self.audited(self.resolve_file(name))?;
        let format = self.audited(
            format
                .parse::<ReportFormat>()
                .map_err(|_| GatewayError::InvalidArgument("Only PDF or PPTX allowed.".to_string())),
        )?;
        let input = self.input_arg(&file);

        self.record(
            AuditRole::User,
            format!("Generating {} for {}", format.as_str().to_uppercase(), file),
        );
        match self
            .workers
            .generator
            .generate_report(&input, format.as_str())
            .await
        {
            Ok(reply) => {
                self.record(
                    AuditRole::Assistant,
                    format!("Report generated: {}", reply.report_path),
                );
                Ok(reply.report_path)
            }
            Err(e) => Err(self.upstream_failure("Report generation", e)),
        }
    }

    fn input_arg(&self, file: &FileRef) -> String {
        self.store.input_path(file).display().to_string()
    }

    fn upstream_failure(&self, what: &'static str, err: RpcError) -> GatewayError {
        warn!("{} failed: {}", what, err);
        self.record(AuditRole::System, format!("{} failed: {}", what, err));
        GatewayError::UpstreamUnavailable {
            worker: what,
            message: err.to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Clarify
    // ------------------------------------------------------------------------

    /// Resolve a free-form query. Worker failures never reach the caller:
    /// they fall back to the static clarification directive.
    pub async fn clarify(&self, query: &str, session: Option<SessionId>) -> Result<Directive> {
        if query.chars().count() > MAX_QUERY_CHARS {
            return self.audited(Err(GatewayError::InvalidArgument(format!(
                "query longer than {} characters",
                MAX_QUERY_CHARS
            ))));
        }
        self.record(AuditRole::User, query);

        let normalized = query.trim().to_lowercase();
        let directive = self
            .workers
            .intent
            .clarify_query(&normalized, session.map(|s| s.to_string()))
            .await
            .map(directive_from_reply)
            .unwrap_or_else(|e| {
                warn!("Clarify fell back to the default directive: {}", e);
                Directive::clarify()
            });

        info!("Clarify decision: {}", directive.kind);
        self.record(AuditRole::Assistant, directive.message.clone());
        Ok(directive)
    }

    // ------------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------------

    /// Path of a rendered report in the artifacts directory.
    pub fn locate_report(&self, name: &str) -> Result<PathBuf> {
        FileRef::parse(name)?;
        let path = self.store.artifacts_dir().join(name);
        if !path.is_file() {
            return Err(GatewayError::NotFound(name.to_string()));
        }
        self.record(AuditRole::System, format!("Downloaded: {}", name));
        Ok(path)
    }
}

/// Apply the documented defaults to an intent worker reply: a blank or
/// unknown `selected_option` means `clarify`; a blank `message` means the
/// default clarification message; a clarification without options offers the
/// canonical three.
pub fn directive_from_reply(reply: ClarifyReply) -> Directive {
    let kind = reply
        .selected_option
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<DirectiveKind>().ok())
        .unwrap_or(DirectiveKind::Clarify);

    let message = reply
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CLARIFY_MESSAGE.to_string());

    let options = if kind == DirectiveKind::Clarify && reply.options.is_empty() {
        CANONICAL_OPTIONS.iter().map(|o| o.to_string()).collect()
    } else {
        reply.options
    };

    Directive {
        kind,
        message,
        options,
    }
}

fn transcript_audit_text(transcript: &str) -> String {
    format!("{}...", truncate_chars(transcript, TRANSCRIPT_AUDIT_CHARS))
}

fn objects_audit_text(objects: &[String]) -> String {
    if objects.is_empty() {
        return NO_OBJECTS_SUMMARY.to_string();
    }
    let quoted: Vec<String> = objects.iter().map(|o| format!("'{}'", o)).collect();
    format!("Objects detected: [{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_defaults_applied_once() {
        let directive = directive_from_reply(ClarifyReply::default());
        assert_eq!(directive.kind, DirectiveKind::Clarify);
        assert_eq!(directive.message, DEFAULT_CLARIFY_MESSAGE);
        assert_eq!(directive.options, CANONICAL_OPTIONS);

        let directive = directive_from_reply(ClarifyReply {
            selected_option: Some("generate_pptx".into()),
            message: Some("   ".into()),
            options: vec![],
        });
        assert_eq!(directive.kind, DirectiveKind::GeneratePptx);
        assert_eq!(directive.message, DEFAULT_CLARIFY_MESSAGE);
        assert!(directive.options.is_empty());
    }

    #[test]
    fn test_unknown_option_is_clarify() {
        let directive = directive_from_reply(ClarifyReply {
            selected_option: Some("dance".into()),
            message: Some("Let's dance".into()),
            options: vec!["A".into()],
        });
        assert_eq!(directive.kind, DirectiveKind::Clarify);
        assert_eq!(directive.message, "Let's dance");
        assert_eq!(directive.options, vec!["A"]);
    }

    #[test]
    fn test_audit_texts() {
        assert_eq!(transcript_audit_text("short"), "short...");
        assert_eq!(transcript_audit_text(&"x".repeat(600)).len(), 503);
        let accented = transcript_audit_text(&"é".repeat(600));
        assert_eq!(accented.chars().count(), TRANSCRIPT_AUDIT_CHARS + 3);
        assert!(accented.ends_with("é..."));
        assert_eq!(objects_audit_text(&[]), "No objects detected.");
        assert_eq!(
            objects_audit_text(&["car".into(), "person".into()]),
            "Objects detected: ['car', 'person']"
        );
    }
}
