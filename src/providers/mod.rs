//! External capability seams and their production implementations.
//!
//! The pipeline only depends on the traits defined here; concrete
//! clients (Pinecone, Groq, the hash embedder) are swappable.

pub mod embedding;
pub mod groq;
pub mod pinecone;

use async_trait::async_trait;

use crate::core::errors::ApiError;

/// Maps normalized text to a fixed-dimension, L2-normalized vector.
///
/// Implementations must be deterministic for identical input: the same
/// text embeds to the same vector across calls and processes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimension, constant for the lifetime of the provider.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;
}

/// Sampling parameters for a completion call.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        // Deterministic sampling keeps the literal-extraction fallback
        // reproducible.
        Self {
            temperature: 0.0,
            max_tokens: 600,
        }
    }
}

/// Text completion given a fully rendered prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, sampling: &SamplingConfig)
        -> Result<String, ApiError>;
}
