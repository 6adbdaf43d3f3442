//! Seams for the external engines a worker drives.
//!
//! The worker never does inference or rendering itself. Each trait below has
//! a command-line adapter that shells out to a user-supplied program.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use vidmesh_protocol::ReportFormat;

use crate::truncate_chars;

/// Default summary length when no summarization model is configured.
pub const SUMMARY_MAX_CHARS: usize = 800;

pub const REPORT_TITLE: &str = "Local AI Video Analyzer — Summary Report";
pub const TRANSCRIPT_SECTION: &str = "Transcript Summary";
pub const VISION_SECTION: &str = "Vision Summary";

// ============================================================================
// Speech to text
// ============================================================================

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, input: &Path) -> Result<String>;
}

/// Runs `<program> <args..> <input>` and takes stdout as the transcript.
pub struct CommandSpeechToText {
    command: EngineCommand,
}

impl CommandSpeechToText {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: EngineCommand::new(program, args),
        }
    }
}

#[async_trait]
impl SpeechToText for CommandSpeechToText {
    async fn transcribe(&self, input: &Path) -> Result<String> {
        let stdout = self.command.run(&[input.as_os_str()], None).await?;
        Ok(stdout.trim().to_string())
    }
}

// ============================================================================
// Object detection
// ============================================================================

/// One detector hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Every hit across the sampled frames; filtering happens in the service.
    async fn detect(&self, input: &Path) -> Result<Vec<Detection>>;
}

/// Runs `<program> <args..> <input>`; stdout holds one `label score` pair per
/// line. The score is the last whitespace-separated token, so labels may
/// contain spaces.
pub struct CommandDetector {
    command: EngineCommand,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: EngineCommand::new(program, args),
        }
    }
}

#[async_trait]
impl ObjectDetector for CommandDetector {
    async fn detect(&self, input: &Path) -> Result<Vec<Detection>> {
        let stdout = self.command.run(&[input.as_os_str()], None).await?;
        parse_detections(&stdout)
    }
}

pub fn parse_detections(text: &str) -> Result<Vec<Detection>> {
    let mut detections = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((label, score)) = line.rsplit_once(char::is_whitespace) else {
            bail!("line {}: expected `<label> <score>`, got {:?}", line_no + 1, line);
        };
        let score: f32 = score
            .parse()
            .with_context(|| format!("line {}: invalid score {:?}", line_no + 1, score))?;
        detections.push(Detection::new(label.trim(), score));
    }
    Ok(detections)
}

// ============================================================================
// Summarization
// ============================================================================

pub trait Summarizer: Send + Sync {
    fn summarize(&self, transcript: &str) -> String;
}

/// Keeps the leading `max_chars` characters.
#[derive(Debug, Clone)]
pub struct TruncatingSummarizer {
    max_chars: usize,
}

impl TruncatingSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self::new(SUMMARY_MAX_CHARS)
    }
}

impl Summarizer for TruncatingSummarizer {
    fn summarize(&self, transcript: &str) -> String {
        truncate_chars(transcript, self.max_chars).to_string()
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Renderer input: the report's text, already laid out into sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    pub transcript_heading: String,
    pub transcript_summary: String,
    pub vision_heading: String,
    /// `Objects detected:` followed by `• label` lines, or a stand-in sentence.
    pub vision_summary: String,
}

impl ReportDocument {
    pub fn new(transcript_summary: String, vision_summary: String) -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            transcript_heading: TRANSCRIPT_SECTION.to_string(),
            transcript_summary,
            vision_heading: VISION_SECTION.to_string(),
            vision_summary,
        }
    }

    /// The bullet lines of the vision section, without the header line.
    pub fn vision_bullets(&self) -> Vec<&str> {
        self.vision_summary
            .lines()
            .filter(|line| line.starts_with('•'))
            .collect()
    }
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, document: &ReportDocument, format: ReportFormat, output: &Path)
        -> Result<()>;
}

/// Runs `<program> <args..> --format <pdf|pptx> <output>` with the document
/// as JSON on stdin.
pub struct CommandRenderer {
    command: EngineCommand,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: EngineCommand::new(program, args),
        }
    }
}

#[async_trait]
impl ReportRenderer for CommandRenderer {
    async fn render(
        &self,
        document: &ReportDocument,
        format: ReportFormat,
        output: &Path,
    ) -> Result<()> {
        let json = serde_json::to_vec(document).context("Failed to serialize report document")?;
        self.command
            .run(
                &[
                    OsStr::new("--format"),
                    OsStr::new(format.as_str()),
                    output.as_os_str(),
                ],
                Some(json.as_slice()),
            )
            .await?;
        if !output.exists() {
            bail!("renderer exited cleanly but wrote nothing to {}", output.display());
        }
        Ok(())
    }
}

// ============================================================================
// Process plumbing
// ============================================================================

struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl EngineCommand {
    fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Run to completion and return stdout. Non-zero exit is an error that
    /// carries (truncated) stderr.
    async fn run(&self, extra_args: &[&OsStr], stdin: Option<&[u8]>) -> Result<String> {
        debug!("Running engine {} {:?}", self.program.display(), extra_args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(extra_args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(bytes)
                .await
                .context("Failed to write engine stdin")?;
            // Close stdin so the engine sees EOF
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                truncate_chars(stderr.trim(), 500)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detections() {
        let parsed = parse_detections("person 0.98\n\ntraffic light 0.51\ncar 0.2\n").unwrap();
        assert_eq!(
            parsed,
            vec![
                Detection::new("person", 0.98),
                Detection::new("traffic light", 0.51),
                Detection::new("car", 0.2),
            ]
        );
    }

    #[test]
    fn test_parse_detections_rejects_garbage() {
        assert!(parse_detections("person").is_err());
        assert!(parse_detections("person high").is_err());
    }

    #[test]
    fn test_truncating_summarizer() {
        let summarizer = TruncatingSummarizer::default();
        let long = "a".repeat(1000);
        assert_eq!(summarizer.summarize(&long).len(), 800);
        assert_eq!(summarizer.summarize("short"), "short");
    }

    #[test]
    fn test_vision_bullets() {
        let doc = ReportDocument::new(
            "t".into(),
            "Objects detected:\n• car\n• person".into(),
        );
        assert_eq!(doc.vision_bullets(), vec!["• car", "• person"]);
        assert_eq!(doc.title, REPORT_TITLE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_speech_to_text_reads_stdout() {
        let engine = CommandSpeechToText::new("echo", vec!["hello from".into()]);
        let text = engine.transcribe(Path::new("clip.mp4")).await.unwrap();
        assert_eq!(text, "hello from clip.mp4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_is_error() {
        let engine = CommandSpeechToText::new("false", Vec::new());
        assert!(engine.transcribe(Path::new("clip.mp4")).await.is_err());
    }
}
