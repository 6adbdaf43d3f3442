//! Semantic intent classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{cosine_similarity, mean_vector, Embedder};
use crate::{IntentError, Result};

/// Number of ranked labels retained in a classification.
pub const TOP_K: usize = 3;

/// Fixed intent enumeration. Declaration order breaks similarity ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    Transcribe,
    Detect,
    Generate,
    Clarify,
}

impl IntentLabel {
    pub const ALL: [IntentLabel; 4] = [
        IntentLabel::Transcribe,
        IntentLabel::Detect,
        IntentLabel::Generate,
        IntentLabel::Clarify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Transcribe => "transcribe",
            IntentLabel::Detect => "detect",
            IntentLabel::Generate => "generate",
            IntentLabel::Clarify => "clarify",
        }
    }

    /// Example phrases averaged into the label's reference vector.
    pub fn examples(&self) -> &'static [&'static str] {
        match self {
            IntentLabel::Transcribe => &[
                "transcribe the video",
                "convert audio to text",
                "speech to text",
                "turn speech into text",
                "generate subtitles",
                "caption the video",
            ],
            IntentLabel::Detect => &[
                "detect objects",
                "analyze the video",
                "what objects are shown",
                "identify what's in the video",
                "run object detection",
                "recognize items",
                "analyze frames",
            ],
            IntentLabel::Generate => &[
                "generate a report",
                "create a summary",
                "make a pdf report",
                "make a pptx presentation",
                "summarize the video",
                "generate output",
                "produce a report",
                "create powerpoint slides",
                "make summary",
                "generate documentation",
                "output pdf or pptx",
            ],
            IntentLabel::Clarify => &[
                "hello",
                "hi",
                "help me",
                "what can you do",
                "options",
                "menu",
            ],
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    pub label: IntentLabel,
    /// Cosine similarity in `[-1, 1]`.
    pub confidence: f32,
}

/// Labels ranked by descending similarity, at most [`TOP_K`] of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub ranked: Vec<ScoredLabel>,
}

impl ClassificationResult {
    /// Rank `scores` (given in declaration order) and keep the top k.
    pub fn from_scores(mut scores: Vec<ScoredLabel>) -> Self {
        // sort_by is stable, so equal scores keep declaration order
        scores.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        scores.truncate(TOP_K);
        Self { ranked: scores }
    }

    pub fn top(&self) -> Option<ScoredLabel> {
        self.ranked.first().copied()
    }
}

#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, query: &str) -> Result<ClassificationResult>;
}

/// Lowercase, trim, drop punctuation, then expand one-word shorthands into a
/// phrase the embedding model handles more reliably.
pub fn normalize_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let stripped: String = lowered
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    match stripped.as_str() {
        "generate" | "make" | "create" | "summary" | "report" => "generate a report".to_string(),
        "detect" | "recognize" | "analyze" => "detect objects in the video".to_string(),
        "transcribe" | "caption" | "subtitles" | "speech" => "transcribe the video".to_string(),
        _ => stripped,
    }
}

/// Scores queries against one reference vector per label.
///
/// Reference vectors are computed once in [`IntentClassifier::new`] and never
/// change afterwards.
pub struct IntentClassifier {
    embedder: Arc<dyn Embedder>,
    references: Vec<(IntentLabel, Vec<f32>)>,
}

impl IntentClassifier {
    /// Embed every example phrase and average them per label.
    pub async fn new(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut references = Vec::with_capacity(IntentLabel::ALL.len());
        for label in IntentLabel::ALL {
            let examples = label.examples();
            if examples.is_empty() {
                return Err(IntentError::EmptyReference(label.as_str()));
            }
            let mut vectors = Vec::with_capacity(examples.len());
            for example in examples {
                vectors.push(embedder.embed(example).await?);
            }
            references.push((label, mean_vector(&vectors)?));
        }
        debug!(labels = references.len(), "Intent reference vectors ready");
        Ok(Self {
            embedder,
            references,
        })
    }

    /// Use precomputed reference vectors.
    pub fn with_references(
        embedder: Arc<dyn Embedder>,
        references: Vec<(IntentLabel, Vec<f32>)>,
    ) -> Self {
        Self {
            embedder,
            references,
        }
    }
}

#[async_trait]
impl Classify for IntentClassifier {
    async fn classify(&self, query: &str) -> Result<ClassificationResult> {
        let normalized = normalize_query(query);
        let query_vec = self.embedder.embed(&normalized).await?;

        let scores = self
            .references
            .iter()
            .map(|(label, reference)| ScoredLabel {
                label: *label,
                confidence: cosine_similarity(&query_vec, reference),
            })
            .collect();

        let result = ClassificationResult::from_scores(scores);
        debug!(query = %normalized, ranked = ?result.ranked, "Classified query");
        Ok(result)
    }
}
