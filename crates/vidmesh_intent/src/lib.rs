//! Intent routing: turn a free-form request into a concrete directive or a
//! clarifying question.
//!
//! Resolution runs an ordered list of keyword override rules first, then
//! falls back to embedding similarity against fixed intent labels, adjusted
//! by per-session memory of the last resolved intent.

pub mod clarifier;
pub mod classifier;
pub mod directive;
pub mod embedding;
pub mod memory;
pub mod rules;

pub use clarifier::{decide, Clarifier, DecisionTrace, Resolution, EXECUTE_THRESHOLD};
pub use classifier::{
    normalize_query, ClassificationResult, Classify, IntentClassifier, IntentLabel, ScoredLabel,
    TOP_K,
};
pub use directive::{Directive, DirectiveKind, CANONICAL_OPTIONS, DEFAULT_CLARIFY_MESSAGE};
pub use embedding::{cosine_similarity, CommandEmbedder, Embedder, HashingEmbedder};
pub use memory::{apply_stickiness, SessionId, SessionMemory};
pub use rules::{first_match, KeywordScan, OverrideRule, OVERRIDE_RULES};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("no reference phrases for intent '{0}'")]
    EmptyReference(&'static str),

    #[error("invalid session id: {0}")]
    InvalidSession(String),
}

pub type Result<T> = std::result::Result<T, IntentError>;
