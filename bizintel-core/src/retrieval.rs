//! Similarity index over policy passages.
//!
//! The index is built offline (`build_index`) and stored as a JSON file. At
//! runtime it is loaded once, read-only, and queried by cosine similarity.
//! Results are ordered by descending score; passages with equal scores keep
//! the order they have in the index file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::embeddings::{EmbeddingBackend, EmbeddingError};
use crate::models::ReferencePassage;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Similarity index unavailable at {path}: {reason}")]
    IndexUnavailable { path: String, reason: String },

    #[error("Query has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One stored passage and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub id: String,
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// On-disk similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyIndex {
    pub model: String,
    pub dimensions: usize,
    pub passages: Vec<IndexedPassage>,
}

impl PolicyIndex {
    /// Load and check an index file. Any failure is `IndexUnavailable`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref();
        let unavailable = |reason: String| RetrievalError::IndexUnavailable {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let index: PolicyIndex = serde_json::from_str(&raw).map_err(|e| unavailable(e.to_string()))?;

        if index.passages.is_empty() {
            return Err(unavailable("index contains no passages".to_string()));
        }
        if let Some(bad) = index
            .passages
            .iter()
            .find(|p| p.embedding.len() != index.dimensions)
        {
            return Err(unavailable(format!(
                "passage {} has {} dimensions, expected {}",
                bad.id,
                bad.embedding.len(),
                index.dimensions
            )));
        }

        tracing::info!(
            path = %path.display(),
            passages = index.passages.len(),
            dimensions = index.dimensions,
            model = %index.model,
            "Loaded similarity index"
        );
        Ok(index)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RetrievalError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Top `k` passages by cosine similarity to `query`.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ReferencePassage>, RetrievalError> {
        if query.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine_similarity(query, &p.embedding)))
            .collect();

        // stable: equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let p = &self.passages[i];
                ReferencePassage {
                    id: p.id.clone(),
                    source: p.source.clone(),
                    text: p.text.clone(),
                    score,
                }
            })
            .collect())
    }

    /// Embed `query` and return the top `k` passages.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        backend: &dyn EmbeddingBackend,
    ) -> Result<Vec<ReferencePassage>, RetrievalError> {
        let vector = backend.embed(query).await?;
        self.top_k(&vector, k)
    }
}

/// Cosine similarity; zero-norm vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Split a policy document into paragraph-aligned chunks of at most
/// `max_chars` characters. A single paragraph longer than the limit is split
/// on whitespace; a single word longer than the limit becomes its own chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, chunks: &mut Vec<String>| {
        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }
        current.clear();
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        let needed = if current.is_empty() {
            paragraph.chars().count()
        } else {
            current.chars().count() + 2 + paragraph.chars().count()
        };

        if needed <= max_chars {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&paragraph);
            continue;
        }

        flush(&mut current, &mut chunks);

        if paragraph.chars().count() <= max_chars {
            current.push_str(&paragraph);
            continue;
        }

        for word in paragraph.split(' ') {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars {
                flush(&mut current, &mut chunks);
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

/// Chunk `text`, embed every chunk, and assemble an index. Passage ids are
/// `<source>#<n>` in document order.
pub async fn build_index(
    text: &str,
    source: &str,
    chunk_chars: usize,
    model: &str,
    backend: &dyn EmbeddingBackend,
) -> Result<PolicyIndex, RetrievalError> {
    let chunks = chunk_text(text, chunk_chars);
    let mut passages = Vec::with_capacity(chunks.len());

    for (n, chunk) in chunks.into_iter().enumerate() {
        let embedding = backend.embed(&chunk).await?;
        tracing::debug!(chunk = n, chars = chunk.len(), "Embedded policy chunk");
        passages.push(IndexedPassage {
            id: format!("{}#{}", source, n),
            source: source.to_string(),
            text: chunk,
            embedding,
        });
    }

    tracing::info!(source, passages = passages.len(), backend = backend.name(), "Built similarity index");

    Ok(PolicyIndex {
        model: model.to_string(),
        dimensions: backend.dimensions(),
        passages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Maps known words to fixed axes so similarity is predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingBackend for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let t = text.to_lowercase();
            Ok(vec![
                t.matches("debt").count() as f32,
                t.matches("collateral").count() as f32,
                t.matches("license").count() as f32,
            ])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    fn passage(id: &str, embedding: Vec<f32>) -> IndexedPassage {
        IndexedPassage {
            id: id.to_string(),
            source: "policy".to_string(),
            text: format!("text of {}", id),
            embedding,
        }
    }

    fn index(passages: Vec<IndexedPassage>) -> PolicyIndex {
        PolicyIndex {
            model: "test".to_string(),
            dimensions: 3,
            passages,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_top_k_descending_similarity() {
        let idx = index(vec![
            passage("a", vec![0.0, 1.0, 0.0]),
            passage("b", vec![1.0, 0.0, 0.0]),
            passage("c", vec![1.0, 1.0, 0.0]),
        ]);
        let results = idx.top_k(&[1.0, 0.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_ties_keep_insertion_order() {
        let idx = index(vec![
            passage("first", vec![0.0, 2.0, 0.0]),
            passage("best", vec![3.0, 0.0, 0.0]),
            passage("second", vec![0.0, 1.0, 0.0]),
            passage("third", vec![0.0, 5.0, 0.0]),
        ]);
        let results = idx.top_k(&[0.0, 1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_top_k_zero_and_oversized_k() {
        let idx = index(vec![passage("a", vec![1.0, 0.0, 0.0])]);
        assert!(idx.top_k(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert_eq!(idx.top_k(&[1.0, 0.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn test_top_k_rejects_wrong_dimensions() {
        let idx = index(vec![passage("a", vec![1.0, 0.0, 0.0])]);
        assert!(matches!(
            idx.top_k(&[1.0, 0.0], 1),
            Err(RetrievalError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_load_missing_file_is_unavailable() {
        let err = PolicyIndex::load("/nonexistent/policy-index.json").unwrap_err();
        assert!(matches!(err, RetrievalError::IndexUnavailable { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_and_inconsistent_files() {
        let dir = tempfile::tempdir().unwrap();

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            PolicyIndex::load(&garbage),
            Err(RetrievalError::IndexUnavailable { .. })
        ));

        let bad_dims = dir.path().join("dims.json");
        index(vec![passage("a", vec![1.0, 0.0])]).save(&bad_dims).unwrap();
        assert!(matches!(
            PolicyIndex::load(&bad_dims),
            Err(RetrievalError::IndexUnavailable { .. })
        ));

        let empty = dir.path().join("empty.json");
        index(vec![]).save(&empty).unwrap();
        assert!(matches!(
            PolicyIndex::load(&empty),
            Err(RetrievalError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let idx = index(vec![
            passage("z", vec![1.0, 0.0, 0.0]),
            passage("a", vec![0.0, 1.0, 0.0]),
        ]);
        idx.save(&path).unwrap();
        assert_eq!(PolicyIndex::load(&path).unwrap(), idx);
    }

    #[test]
    fn test_chunk_text_respects_paragraphs_and_limit() {
        let text = "Alpha one.\n\nBeta two.\n\nGamma three is a much longer paragraph here.";
        let chunks = chunk_text(text, 25);
        assert_eq!(chunks[0], "Alpha one.\n\nBeta two.");
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
        assert_eq!(chunks.join(" ").split_whitespace().count(), text.split_whitespace().count());
    }

    #[tokio::test]
    async fn test_build_index_then_search() {
        let text = "Debt service coverage must exceed 1.25.\n\nCollateral is required for startups.\n\nA valid license is mandatory.";
        let idx = build_index(text, "policy.txt", 45, "keyword", &KeywordEmbedder).await.unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.passages[1].id, "policy.txt#1");

        let results = idx.search("collateral requirements", 1, &KeywordEmbedder).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "policy.txt#1");
    }
}
