use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::answer::AnswerComposer;
use crate::catalog::{CatalogConfig, ProductCatalog};
use crate::core::config::Settings;
use crate::pipeline::RagPipeline;
use crate::providers::embedding::HashEmbedding;
use crate::providers::groq::GroqCompletion;
use crate::providers::pinecone::PineconeIndex;
use crate::providers::{CompletionProvider, EmbeddingProvider};
use crate::query::QueryExpander;
use crate::search::engine::{SearchConfig, SearchEngine};
use crate::search::index::VectorIndex;
use crate::session::{ConversationStore, SessionConfig};

pub struct AppState {
    pub pipeline: RagPipeline,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the full pipeline from validated settings.
    pub fn initialize(settings: &Settings) -> Arc<Self> {
        let catalog = Arc::new(ProductCatalog::new(CatalogConfig::default()));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedding::new());
        let index: Arc<dyn VectorIndex> = Arc::new(PineconeIndex::new(
            settings.pinecone_index_host.clone(),
            settings.pinecone_api_key.clone(),
            settings.pinecone_namespace.clone(),
        ));
        let completion: Arc<dyn CompletionProvider> = Arc::new(GroqCompletion::new(
            settings.groq_api_key.clone(),
            settings.groq_model.clone(),
        ));

        let engine = SearchEngine::new(
            embedder.clone(),
            QueryExpander::default(),
            SearchConfig::default(),
        );
        let composer = AnswerComposer::new(catalog.clone(), completion);
        let sessions = Arc::new(ConversationStore::new(SessionConfig::default()));

        let pipeline = RagPipeline::new(catalog, embedder, index, engine, composer, sessions);

        Arc::new(AppState {
            pipeline,
            started_at: Utc::now(),
        })
    }
}
