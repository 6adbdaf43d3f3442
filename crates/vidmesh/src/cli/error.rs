//! Helpful error output for CLI commands
//!
//! Gateway errors are rendered with what went wrong and what to try next.

use std::fmt;
use vidmesh_gateway::GatewayError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Map a gateway failure onto the next thing the user can try.
    pub fn from_gateway(err: &GatewayError) -> Self {
        let base = Self::new(err.to_string());
        match err {
            GatewayError::NotFound(_) => base
                .with_context("The gateway only works on files it has stored")
                .with_suggestion("TRY: Upload the video first: vidmesh upload <path.mp4>")
                .with_suggestion("TRY: Use the exact name printed by `vidmesh upload`"),
            GatewayError::InvalidArgument(_) => base
                .with_suggestion("TRY: Reports are generated as --format pdf or --format pptx")
                .with_suggestion("TRY: File names must not contain path separators"),
            GatewayError::UpstreamUnavailable { worker, .. } => base
                .with_context(format!("{} worker did not complete the request", worker))
                .with_suggestion("TRY: Start the worker: vidmesh worker --role <role> --engine <program>")
                .with_suggestion("TRY: Check the worker address flags or VIDMESH_*_ADDR variables"),
            GatewayError::Storage(_) => base
                .with_suggestion("TRY: Set VIDMESH_HOME to a writable directory"),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Human-readable rendering for stderr.
pub fn render(err: &anyhow::Error) -> String {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.to_string();
    }
    if let Some(gateway) = err.downcast_ref::<GatewayError>() {
        return HelpfulError::from_gateway(gateway).to_string();
    }
    format!("ERROR: {:#}", err)
}

/// `{"error": ..., "kind": ...}` on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let kind = match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::NotFound(_)) => "not_found",
        Some(GatewayError::InvalidArgument(_)) => "invalid_argument",
        Some(GatewayError::UpstreamUnavailable { .. }) => "upstream_unavailable",
        Some(GatewayError::Storage(_)) => "storage",
        None => "internal",
    };
    let body = serde_json::json!({
        "error": format!("{:#}", err),
        "kind": kind,
    });
    println!("{}", body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_not_found_suggests_upload() {
        let err = anyhow::Error::new(GatewayError::NotFound("x.mp4".into()));
        let text = render(&err);
        assert!(text.contains("File not found: x.mp4"));
        assert!(text.contains("vidmesh upload"));
    }

    #[test]
    fn test_upstream_names_worker() {
        let err = GatewayError::UpstreamUnavailable {
            worker: "Transcription",
            message: "timed out".into(),
        };
        let helpful = HelpfulError::from_gateway(&err);
        assert_eq!(helpful.message, "Transcription failed: timed out");
        assert!(helpful
            .context
            .as_deref()
            .is_some_and(|c| c.starts_with("Transcription worker")));
    }

    #[test]
    fn test_plain_errors_render_chain() {
        let err = anyhow::anyhow!("inner").context("outer");
        assert_eq!(render(&err), "ERROR: outer: inner");
    }
}
