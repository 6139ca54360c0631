//! In-memory vector index.
//!
//! Stores [`EmbeddedChunk`]s and answers k-nearest-neighbor queries by
//! brute-force inner product (cosine similarity on the unit-norm vectors the
//! embedder produces). Built once per corpus version; a corpus change means
//! a full rebuild. Read-only after build, so concurrent queries need no
//! locking.

use anyhow::Result;

use crate::embedding::dot;
use crate::error::RagError;
use crate::models::{EmbeddedChunk, ScoredChunk};

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Bulk-load embedded chunks. Build phase only; not called once serving
    /// has begun.
    pub fn insert(&mut self, chunks: Vec<EmbeddedChunk>) {
        self.entries.extend(chunks);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the k entries most similar to the query vector, descending.
    /// Ties keep insertion order (stable sort). If the index holds fewer
    /// than k entries, all of them are returned.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("query k must be >= 1".to_string()).into());
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: dot(vector, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, EmbeddedChunk};

    fn entry(text: &str, source: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                text: text.to_string(),
                source: source.to_string(),
            },
            vector,
        }
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.insert(vec![
            entry("a", "A", vec![1.0, 0.0]),
            entry("b", "B", vec![0.0, 1.0]),
            entry("c", "C", vec![0.7071, 0.7071]),
        ]);
        index
    }

    #[test]
    fn test_query_returns_k_sorted_descending() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.source, "A");
        assert_eq!(results[1].chunk.source, "C");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_query_k_larger_than_index_returns_all() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_query_k_zero_is_invalid_argument() {
        let index = sample_index();
        let err = index.query(&[1.0, 0.0], 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let mut index = VectorIndex::new();
        index.insert(vec![
            entry("first", "F", vec![1.0, 0.0]),
            entry("second", "S", vec![1.0, 0.0]),
        ]);
        let results = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk.source, "F");
        assert_eq!(results[1].chunk.source, "S");
    }

    #[test]
    fn test_query_deterministic() {
        let index = sample_index();
        let a = index.query(&[0.6, 0.8], 3).unwrap();
        let b = index.query(&[0.6, 0.8], 3).unwrap();
        let order = |r: &[ScoredChunk]| r.iter().map(|s| s.chunk.source.clone()).collect::<Vec<_>>();
        assert_eq!(order(&a), order(&b));
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = VectorIndex::new();
        assert!(index.query(&[1.0, 0.0], 3).unwrap().is_empty());
        assert!(index.is_empty());
    }
}
