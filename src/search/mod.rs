//! Vector-similarity retrieval.
//!
//! `index` defines the typed boundary to the external vector database;
//! `engine` implements filtering, deduplication, section forcing and
//! ranking on top of it.

pub mod engine;
pub mod index;

pub use engine::{SearchConfig, SearchEngine};
pub use index::{ChunkMetadata, SearchMatch, VectorIndex};
