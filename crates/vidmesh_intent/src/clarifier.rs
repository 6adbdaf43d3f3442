//! Clarification state machine.
//!
//! Evaluation order, first match wins:
//! 1. multi-action conflict -> `clarify` (classifier not consulted)
//! 2. explicit format keyword -> `generate_pdf` / `generate_pptx` / `generate_both`
//! 3. classifier top label
//! 4. stickiness boost against the session's previous label, then record the label
//! 5. per-label decision (`generate` always asks for a format)

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::classifier::{Classify, IntentLabel, ScoredLabel};
use crate::directive::Directive;
use crate::memory::{SessionId, SessionMemory};
use crate::rules::{first_match, KeywordScan};
use crate::Result;

/// Auto-execute threshold for `transcribe` and `detect`.
pub const EXECUTE_THRESHOLD: f32 = 0.5;

/// How a directive was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DecisionTrace {
    /// A keyword rule short-circuited the classifier.
    Rule { name: String },
    /// The classifier decided; `effective` includes any stickiness boost.
    Classified {
        label: IntentLabel,
        raw: f32,
        effective: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub directive: Directive,
    pub trace: DecisionTrace,
}

pub struct Clarifier {
    classifier: Arc<dyn Classify>,
    memory: SessionMemory,
}

impl Clarifier {
    pub fn new(classifier: Arc<dyn Classify>) -> Self {
        Self {
            classifier,
            memory: SessionMemory::new(),
        }
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// Resolve `query` for `session` (`None` = shared default session).
    ///
    /// Errors only when the classifier itself fails.
    pub async fn resolve(&self, query: &str, session: Option<SessionId>) -> Result<Resolution> {
        let scan = KeywordScan::scan(query);
        if let Some(rule) = first_match(&scan) {
            info!(rule = rule.name, "Keyword rule matched");
            return Ok(Resolution {
                directive: (rule.directive)(),
                trace: DecisionTrace::Rule {
                    name: rule.name.to_string(),
                },
            });
        }

        let top = self
            .classifier
            .classify(query)
            .await?
            .top()
            .unwrap_or(ScoredLabel {
                label: IntentLabel::Clarify,
                confidence: 0.0,
            });

        let effective = self.memory.observe(session, top.label, top.confidence);
        debug!(
            label = %top.label,
            raw = top.confidence,
            effective,
            "Classifier decision"
        );

        let directive = decide(top.label, effective);
        info!(label = %top.label, confidence = effective, directive = %directive.kind, "Resolved query");

        Ok(Resolution {
            directive,
            trace: DecisionTrace::Classified {
                label: top.label,
                raw: top.confidence,
                effective,
            },
        })
    }
}

/// Step 5: map the (boosted) top label to a directive.
pub fn decide(label: IntentLabel, confidence: f32) -> Directive {
    match label {
        IntentLabel::Generate => Directive::ask_generate_format(),
        IntentLabel::Transcribe if confidence >= EXECUTE_THRESHOLD => Directive::transcribe(),
        IntentLabel::Detect if confidence >= EXECUTE_THRESHOLD => Directive::detect(),
        _ => Directive::clarify(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveKind;

    #[test]
    fn test_generate_always_asks_for_format() {
        assert_eq!(
            decide(IntentLabel::Generate, 0.05).kind,
            DirectiveKind::AskGenerateFormat
        );
        assert_eq!(
            decide(IntentLabel::Generate, 0.95).kind,
            DirectiveKind::AskGenerateFormat
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(decide(IntentLabel::Transcribe, 0.5).kind, DirectiveKind::Transcribe);
        assert_eq!(decide(IntentLabel::Transcribe, 0.49).kind, DirectiveKind::Clarify);
        assert_eq!(decide(IntentLabel::Detect, 0.5).kind, DirectiveKind::Detect);
        assert_eq!(decide(IntentLabel::Detect, 0.2).kind, DirectiveKind::Clarify);
    }

    #[test]
    fn test_clarify_label_never_executes() {
        let directive = decide(IntentLabel::Clarify, 0.99);
        assert_eq!(directive, Directive::clarify());
    }
}
