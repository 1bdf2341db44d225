//! Hash-based placeholder embedding.
//!
//! Stands in for a real sentence-embedding model (the stored vectors
//! were produced with the same scheme at 1024 dimensions). Word hashes
//! are bucketed into the vector with small position and length weights,
//! then L2-normalized. Deterministic by construction; swap in a real
//! model behind `EmbeddingProvider` for semantic-quality retrieval.

use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::core::errors::ApiError;

pub const EMBEDDING_DIMENSION: usize = 1024;

/// Collapses whitespace and lowercases before embedding so equivalent
/// phrasings hash identically.
pub fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct HashEmbedding;

impl HashEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; EMBEDDING_DIMENSION];
        let lowered = text.to_lowercase();

        for (position, word) in lowered.split_whitespace().enumerate() {
            let mut hash: i32 = 0;
            for ch in word.chars() {
                hash = hash
                    .wrapping_shl(5)
                    .wrapping_sub(hash)
                    .wrapping_add(ch as i32);
            }

            let base = hash.unsigned_abs() as usize % EMBEDDING_DIMENSION;
            embedding[base] += 1.0;

            // Early words carry more signal.
            if position < 10 {
                embedding[(base + position) % EMBEDDING_DIMENSION] += 0.5;
            }

            // Longer words carry more signal.
            let word_len = word.chars().count();
            if word_len > 3 {
                embedding[(base + word_len) % EMBEDDING_DIMENSION] += 0.3;
            }
        }

        let magnitude = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        Ok(self.embed_sync(text))
    }
}
