//! The embedding seam.
//!
//! The model itself lives outside this crate. `HashingEmbedder` is a
//! deterministic offline stand-in; `CommandEmbedder` shells out to an
//! external model runner.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{IntentError, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// `dot(a, b) / (|a| * |b|)`, or `0.0` when either norm is zero or the
/// dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Element-wise mean of equally sized vectors.
pub(crate) fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let dimension = first.len();
    let mut sum = vec![0.0f32; dimension];
    for vector in vectors {
        if vector.len() != dimension {
            return Err(IntentError::DimensionMismatch {
                expected: dimension,
                got: vector.len(),
            });
        }
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.len() as f32;
    Ok(sum.into_iter().map(|v| v / count).collect())
}

/// Feature-hashing bag of words and character trigrams.
///
/// Similar wordings ("transcribe" / "transcription") share trigram buckets,
/// which is enough to separate the handful of intents offline.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let digest = blake3::hash(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        let hash = u64::from_le_bytes(head);
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vec[index] += sign * weight;
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            self.add_feature(&mut vec, &word, 1.0);

            let padded: Vec<char> = format!("<{}>", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vec, &trigram, 0.5);
            }
        }
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Runs an external model: text on stdin, whitespace-separated floats on stdout.
#[derive(Debug, Clone)]
pub struct CommandEmbedder {
    program: String,
    args: Vec<String>,
}

impl CommandEmbedder {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Embedder for CommandEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IntentError::Embedding(format!("failed to spawn {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| IntentError::Embedding(format!("failed to write stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| IntentError::Embedding(format!("embedder did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntentError::Embedding(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_vector(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    let vector = raw
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c| c == ',' || c == '[' || c == ']')
                .parse::<f32>()
                .map_err(|e| IntentError::Embedding(format!("bad component '{}': {}", token, e)))
        })
        .collect::<Result<Vec<f32>>>()?;
    if vector.is_empty() {
        return Err(IntentError::Embedding("embedder produced no output".to_string()));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 1e-6);

        let e = vec![1.0, 0.0];
        let f = vec![-1.0, 0.0];
        assert!((cosine_similarity(&e, &f) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm_fails_closed() {
        let zero = vec![0.0, 0.0, 0.0];
        let other = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&other, &zero), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mean_vector() {
        let mean = mean_vector(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 4.0]);
        assert!(matches!(
            mean_vector(&[vec![1.0], vec![1.0, 2.0]]),
            Err(IntentError::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("transcribe the video").await.unwrap();
        let b = embedder.embed("transcribe the video").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn test_hashing_embedder_single_bucket_sums_signed_features() {
        // "a" contributes the word (1.0) and the trigram "<a>" (0.5)
        let embedder = HashingEmbedder::new(1);
        let v = embedder.embed("a").await.unwrap();
        assert_eq!(v.len(), 1);
        let magnitude = v[0].abs();
        assert!(magnitude == 0.5 || magnitude == 1.5, "got {}", v[0]);
    }

    #[tokio::test]
    async fn test_hashing_embedder_empty_text_is_zero() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_hashing_embedder_related_words_overlap() {
        let embedder = HashingEmbedder::default();
        let q = embedder.embed("transcription").await.unwrap();
        let near = embedder.embed("transcribe").await.unwrap();
        let far = embedder.embed("pineapple").await.unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("0.5 1 -2\n").unwrap(), vec![0.5, 1.0, -2.0]);
        assert_eq!(parse_vector("[0.5, 1.0]").unwrap(), vec![0.5, 1.0]);
        assert!(parse_vector("").is_err());
        assert!(parse_vector("abc").is_err());
    }
}
