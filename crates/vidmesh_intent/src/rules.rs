//! Deterministic keyword rules evaluated before the classifier.
//!
//! [`OVERRIDE_RULES`] is checked top to bottom and the first match wins.

use regex::Regex;
use std::sync::OnceLock;

use crate::directive::Directive;

struct Patterns {
    transcribe: Regex,
    detect: Regex,
    generate: Regex,
    pdf: Regex,
    slides: Regex,
    both: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("keyword pattern compiles");
        Patterns {
            transcribe: compile(r"\b(transcrib\w*|subtitles?|speech|audio)\b"),
            detect: compile(r"\b(detect\w*|identify|recogni[sz]e|objects?|analy[sz]\w*)\b"),
            generate: compile(r"\b(generate|reports?|summary|create|make|build|output)\b"),
            pdf: compile(r"\bpdf\b"),
            slides: compile(r"\b(ppt|pptx|powerpoint|slides?)\b"),
            both: compile(r"\bboth\b"),
        }
    })
}

/// Which keyword groups a query mentions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordScan {
    pub transcribe: bool,
    pub detect: bool,
    pub generate: bool,
    pub pdf: bool,
    pub slides: bool,
    pub both: bool,
}

impl KeywordScan {
    pub fn scan(query: &str) -> Self {
        let query = query.trim().to_lowercase();
        let p = patterns();
        Self {
            transcribe: p.transcribe.is_match(&query),
            detect: p.detect.is_match(&query),
            generate: p.generate.is_match(&query),
            pdf: p.pdf.is_match(&query),
            slides: p.slides.is_match(&query),
            both: p.both.is_match(&query),
        }
    }

    /// Number of distinct actions named.
    pub fn action_groups(&self) -> usize {
        [self.transcribe, self.detect, self.generate]
            .iter()
            .filter(|hit| **hit)
            .count()
    }
}

pub struct OverrideRule {
    pub name: &'static str,
    pub applies: fn(&KeywordScan) -> bool,
    pub directive: fn() -> Directive,
}

fn names_several_actions(scan: &KeywordScan) -> bool {
    scan.action_groups() >= 2
}

fn names_pdf(scan: &KeywordScan) -> bool {
    scan.pdf
}

fn names_slides(scan: &KeywordScan) -> bool {
    scan.slides
}

fn names_both(scan: &KeywordScan) -> bool {
    scan.both
}

pub const OVERRIDE_RULES: &[OverrideRule] = &[
    OverrideRule {
        name: "multi_action",
        applies: names_several_actions,
        directive: Directive::multi_action,
    },
    OverrideRule {
        name: "format_pdf",
        applies: names_pdf,
        directive: Directive::generate_pdf,
    },
    OverrideRule {
        name: "format_pptx",
        applies: names_slides,
        directive: Directive::generate_pptx,
    },
    OverrideRule {
        name: "format_both",
        applies: names_both,
        directive: Directive::generate_both,
    },
];

/// First rule matching `scan`, if any.
pub fn first_match(scan: &KeywordScan) -> Option<&'static OverrideRule> {
    OVERRIDE_RULES.iter().find(|rule| (rule.applies)(scan))
}
