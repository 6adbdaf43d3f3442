//! Terminal output of intent resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CLARIFY_MESSAGE: &str =
    "Did you want me to transcribe, detect objects, or generate a report?";

pub const MULTI_ACTION_MESSAGE: &str = "I noticed you mentioned more than one action. \
     Please specify just one: Transcribe, Detect Objects, or Generate a Report.";

pub const CANONICAL_OPTIONS: [&str; 3] = ["Transcribe", "Detect Objects", "Generate Report"];

pub const FORMAT_OPTIONS: [&str; 3] = ["PDF", "PPTX", "Both"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Transcribe,
    Detect,
    GeneratePdf,
    GeneratePptx,
    GenerateBoth,
    AskGenerateFormat,
    Clarify,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Transcribe => "transcribe",
            DirectiveKind::Detect => "detect",
            DirectiveKind::GeneratePdf => "generate_pdf",
            DirectiveKind::GeneratePptx => "generate_pptx",
            DirectiveKind::GenerateBoth => "generate_both",
            DirectiveKind::AskGenerateFormat => "ask_generate_format",
            DirectiveKind::Clarify => "clarify",
        }
    }

    /// Directives the caller may run without another round-trip.
    pub fn is_executable(&self) -> bool {
        !matches!(
            self,
            DirectiveKind::AskGenerateFormat | DirectiveKind::Clarify
        )
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DirectiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(DirectiveKind::Transcribe),
            "detect" => Ok(DirectiveKind::Detect),
            "generate_pdf" => Ok(DirectiveKind::GeneratePdf),
            "generate_pptx" => Ok(DirectiveKind::GeneratePptx),
            "generate_both" => Ok(DirectiveKind::GenerateBoth),
            "ask_generate_format" => Ok(DirectiveKind::AskGenerateFormat),
            "clarify" => Ok(DirectiveKind::Clarify),
            other => Err(format!("unknown directive: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub message: String,
    /// Empty for executable directives, 2-3 choices otherwise.
    #[serde(default)]
    pub options: Vec<String>,
}

impl Directive {
    fn new(kind: DirectiveKind, message: &str, options: &[&str]) -> Self {
        Self {
            kind,
            message: message.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn transcribe() -> Self {
        Self::new(DirectiveKind::Transcribe, "Transcribing the video now...", &[])
    }

    pub fn detect() -> Self {
        Self::new(DirectiveKind::Detect, "Detecting objects in the video...", &[])
    }

    pub fn generate_pdf() -> Self {
        Self::new(DirectiveKind::GeneratePdf, "Generating PDF report...", &[])
    }

    pub fn generate_pptx() -> Self {
        Self::new(
            DirectiveKind::GeneratePptx,
            "Generating PowerPoint report...",
            &[],
        )
    }

    pub fn generate_both() -> Self {
        Self::new(
            DirectiveKind::GenerateBoth,
            "Generating both PDF and PowerPoint reports...",
            &[],
        )
    }

    pub fn ask_generate_format() -> Self {
        Self::new(
            DirectiveKind::AskGenerateFormat,
            "Would you like the report in PDF or PowerPoint (PPTX) format?",
            &FORMAT_OPTIONS,
        )
    }

    /// The static answer used whenever nothing better is known.
    pub fn clarify() -> Self {
        Self::new(
            DirectiveKind::Clarify,
            DEFAULT_CLARIFY_MESSAGE,
            &CANONICAL_OPTIONS,
        )
    }

    pub fn multi_action() -> Self {
        Self::new(
            DirectiveKind::Clarify,
            MULTI_ACTION_MESSAGE,
            &CANONICAL_OPTIONS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            DirectiveKind::Transcribe,
            DirectiveKind::Detect,
            DirectiveKind::GeneratePdf,
            DirectiveKind::GeneratePptx,
            DirectiveKind::GenerateBoth,
            DirectiveKind::AskGenerateFormat,
            DirectiveKind::Clarify,
        ] {
            assert_eq!(kind.as_str().parse::<DirectiveKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("dance".parse::<DirectiveKind>().is_err());
    }

    #[test]
    fn test_option_lists() {
        assert!(Directive::transcribe().options.is_empty());
        assert!(Directive::generate_pptx().options.is_empty());
        assert_eq!(
            Directive::clarify().options,
            vec!["Transcribe", "Detect Objects", "Generate Report"]
        );
        assert_eq!(
            Directive::ask_generate_format().options,
            vec!["PDF", "PPTX", "Both"]
        );
    }

    #[test]
    fn test_executable_kinds() {
        assert!(DirectiveKind::Detect.is_executable());
        assert!(DirectiveKind::GenerateBoth.is_executable());
        assert!(!DirectiveKind::AskGenerateFormat.is_executable());
        assert!(!DirectiveKind::Clarify.is_executable());
    }
}
