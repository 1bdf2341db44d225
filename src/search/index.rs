//! Typed boundary to the external vector index.
//!
//! The index returns arbitrary per-record metadata; it is coerced into
//! `ChunkMetadata` here so the rest of the pipeline never touches
//! untyped JSON. Missing fields become defaults rather than errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// Metadata carried by every stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Product the chunk belongs to.
    #[serde(default = "default_product")]
    pub product: String,
    /// Free-text section label ("Overview", "Cara Pakai", ...).
    #[serde(default = "default_section")]
    pub section: String,
    /// The chunk body text.
    #[serde(default)]
    pub chunk_text: String,
    /// Anything else the index stored alongside the chunk.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_product() -> String {
    "Unknown".to_string()
}

fn default_section() -> String {
    "General".to_string()
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            product: default_product(),
            section: default_section(),
            chunk_text: String::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// One ranked result from the vector index.
///
/// Immutable once returned; lives for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    /// Similarity score, higher = more relevant.
    pub score: f32,
    pub metadata: ChunkMetadata,
}

impl SearchMatch {
    /// Coerces a raw index record into a typed match.
    ///
    /// Unparseable metadata degrades to defaults instead of failing the
    /// whole response.
    pub fn from_raw(id: String, score: f32, metadata: Option<Value>) -> Self {
        let metadata = metadata
            .and_then(|value| serde_json::from_value::<ChunkMetadata>(value).ok())
            .unwrap_or_default();
        Self {
            id,
            score,
            metadata,
        }
    }
}

/// Abstract query interface over the vector database.
///
/// Scores must be comparable across calls as higher-is-better. The
/// namespace is fixed at construction; every query is scoped to it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fetch the `top_k` nearest records to `vector` with metadata.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_defaults_for_missing_fields() {
        let m = SearchMatch::from_raw("c1".into(), 0.9, Some(json!({"chunk_text": "isi"})));
        assert_eq!(m.metadata.product, "Unknown");
        assert_eq!(m.metadata.section, "General");
        assert_eq!(m.metadata.chunk_text, "isi");
    }

    #[test]
    fn test_metadata_keeps_extra_fields() {
        let m = SearchMatch::from_raw(
            "c2".into(),
            0.5,
            Some(json!({
                "product": "Crystallure Supreme Advanced Hydra Gel",
                "section": "Overview",
                "chunk_text": "150 ml gel",
                "sku": "CRY-001"
            })),
        );
        assert_eq!(m.metadata.section, "Overview");
        assert_eq!(m.metadata.extra.get("sku"), Some(&json!("CRY-001")));
    }

    #[test]
    fn test_missing_metadata_is_not_an_error() {
        let m = SearchMatch::from_raw("c3".into(), 0.2, None);
        assert_eq!(m.metadata.product, "Unknown");
        assert!(m.metadata.chunk_text.is_empty());
    }
}
