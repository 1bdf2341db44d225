//! Request orchestration: one question in, one answer out.
//!
//! The pipeline is strictly sequential per request: connectivity probe,
//! context render, product extraction, retrieval, composition, history
//! record. Index failures degrade to fixed fallback answers instead of
//! surfacing as errors.

use std::sync::Arc;

use serde::Serialize;

use crate::answer::AnswerComposer;
use crate::catalog::ProductCatalog;
use crate::providers::EmbeddingProvider;
use crate::search::engine::SearchEngine;
use crate::search::index::VectorIndex;
use crate::session::{ConversationStore, Message, Role};

pub const DB_UNREACHABLE_MESSAGE: &str =
    "Maaf, tidak dapat terhubung ke database Pinecone. Silakan coba lagi atau hubungi administrator.";
pub const NO_RELEVANT_INFO_MESSAGE: &str =
    "Maaf, tidak ada informasi relevan ditemukan untuk pertanyaan Anda.";

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(rename = "productDetected")]
    pub product_detected: Option<String>,
    #[serde(rename = "totalMatches")]
    pub total_matches: usize,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

pub struct RagPipeline {
    catalog: Arc<ProductCatalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    engine: SearchEngine,
    composer: AnswerComposer,
    sessions: Arc<ConversationStore>,
}

impl RagPipeline {
    pub fn new(
        catalog: Arc<ProductCatalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        engine: SearchEngine,
        composer: AnswerComposer,
        sessions: Arc<ConversationStore>,
    ) -> Self {
        Self {
            catalog,
            embedder,
            index,
            engine,
            composer,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<ConversationStore> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<ProductCatalog> {
        &self.catalog
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Cheap reachability check before committing to the full pipeline.
    async fn probe_index(&self) -> bool {
        let vector = match self.embedder.embed("test").await {
            Ok(v) => v,
            Err(err) => {
                tracing::error!(error = %err, "probe embedding failed");
                return false;
            }
        };
        match self.index.query(&vector, 1).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(error = %err, "index connectivity probe failed");
                false
            }
        }
    }

    pub async fn ask_question(&self, question: &str, session_id: Option<String>) -> AskResponse {
        let session_id = session_id.unwrap_or_else(|| self.sessions.new_session_id());

        if !self.probe_index().await {
            return AskResponse {
                answer: DB_UNREACHABLE_MESSAGE.to_string(),
                product_detected: None,
                total_matches: 0,
                session_id,
            };
        }

        let context = self.sessions.get_context(&session_id);
        let context_opt = if context.is_empty() {
            None
        } else {
            Some(context.as_str())
        };

        let product = self.catalog.extract_with_context(question, context_opt);
        match &product {
            Some(p) => tracing::info!(product = p.name(), "product detected"),
            None => tracing::info!("no specific product detected, searching all products"),
        }

        let top_k = self.engine.config().top_k;
        let matches = match self
            .engine
            .search(question, self.index.as_ref(), product.as_ref(), top_k)
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                tracing::error!(error = %err, "search failed");
                return AskResponse {
                    answer: DB_UNREACHABLE_MESSAGE.to_string(),
                    product_detected: product.map(|p| p.name().to_string()),
                    total_matches: 0,
                    session_id,
                };
            }
        };

        let product_name = product.as_ref().map(|p| p.name().to_string());

        let (answer, total_matches) = if matches.is_empty() {
            (NO_RELEVANT_INFO_MESSAGE.to_string(), 0)
        } else {
            let answer = self
                .composer
                .compose(question, &matches, context_opt)
                .await;
            (answer, matches.len())
        };

        let now = self.sessions.now();
        self.sessions.record(
            &session_id,
            Message::new(Role::User, question, product.clone(), now),
        );
        self.sessions.record(
            &session_id,
            Message::new(Role::Assistant, answer.clone(), None, now),
        );

        AskResponse {
            answer,
            product_detected: product_name,
            total_matches,
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::catalog::CURRENT_PRODUCT_LABEL;
    use crate::core::errors::ApiError;
    use crate::providers::embedding::HashEmbedding;
    use crate::providers::{CompletionProvider, SamplingConfig};
    use crate::query::QueryExpander;
    use crate::search::engine::SearchConfig;
    use crate::search::index::SearchMatch;
    use crate::session::SessionConfig;

    const GEL: &str = "Crystallure Supreme Advanced Hydra Gel";
    const FOAM: &str = "Crystallure Moisture Rich Cleansing Foam";

    struct FakeIndex {
        responses: Mutex<Vec<Vec<SearchMatch>>>,
        fail: bool,
    }

    impl FakeIndex {
        fn new(responses: Vec<Vec<SearchMatch>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                fail: false,
            }
        }

        fn unreachable() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<SearchMatch>, ApiError> {
            if self.fail {
                return Err(ApiError::Internal("connection refused".into()));
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    struct CountingCompletion {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CompletionProvider for CountingCompletion {
        async fn complete(
            &self,
            _prompt: &str,
            _sampling: &SamplingConfig,
        ) -> Result<String, ApiError> {
            *self.calls.lock().unwrap() += 1;
            Ok("jawaban model".to_string())
        }
    }

    fn chunk(product: &str, section: &str, text: &str) -> SearchMatch {
        SearchMatch::from_raw(
            format!("{}-{}", product, section),
            0.9,
            Some(json!({
                "product": product,
                "section": section,
                "chunk_text": text,
            })),
        )
    }

    fn build_pipeline(
        index: FakeIndex,
        completion: Arc<CountingCompletion>,
    ) -> (RagPipeline, Arc<ConversationStore>) {
        let catalog = Arc::new(ProductCatalog::with_names(vec![
            GEL.to_string(),
            FOAM.to_string(),
        ]));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedding::new());
        let sessions = Arc::new(ConversationStore::new(SessionConfig::default()));
        let engine = SearchEngine::new(
            embedder.clone(),
            QueryExpander::default(),
            SearchConfig::default(),
        );
        let composer = AnswerComposer::new(catalog.clone(), completion);
        let pipeline = RagPipeline::new(
            catalog,
            embedder,
            Arc::new(index),
            engine,
            composer,
            sessions.clone(),
        );
        (pipeline, sessions)
    }

    fn counting_completion() -> Arc<CountingCompletion> {
        Arc::new(CountingCompletion {
            calls: Mutex::new(0),
        })
    }

    #[tokio::test]
    async fn test_literal_volume_answer_without_model_call() {
        // First response feeds the probe, second the primary search.
        let index = FakeIndex::new(vec![
            vec![],
            vec![chunk(GEL, "Overview", "150 ml gel ringan untuk wajah.")],
        ]);
        let completion = counting_completion();
        let (pipeline, _) = build_pipeline(index, completion.clone());

        let response = pipeline
            .ask_question("berapa ml supreme advanced hydra gel?", None)
            .await;

        assert!(response.answer.contains("150 ml"));
        assert!(response.answer.contains(GEL));
        assert_eq!(response.product_detected.as_deref(), Some(GEL));
        assert_eq!(*completion.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listing_question_enumerates_catalog() {
        let index = FakeIndex::new(vec![
            vec![],
            vec![chunk(GEL, "Overview", "150 ml gel.")],
        ]);
        let (pipeline, _) = build_pipeline(index, counting_completion());

        let response = pipeline
            .ask_question("apa aja produk crystallure?", None)
            .await;

        assert!(response.answer.contains(&format!("1. {}", FOAM)));
        assert!(response.answer.contains(&format!("2. {}", GEL)));
        assert_eq!(response.product_detected.as_deref(), Some("Crystallure"));
    }

    #[tokio::test]
    async fn test_zero_matches_yields_fixed_message() {
        let index = FakeIndex::new(vec![]);
        let (pipeline, sessions) = build_pipeline(index, counting_completion());

        let response = pipeline.ask_question("ada produk baru?", None).await;

        assert_eq!(response.answer, NO_RELEVANT_INFO_MESSAGE);
        assert_eq!(response.total_matches, 0);
        // The exchange is still recorded.
        assert_eq!(sessions.stats().total_messages, 2);
    }

    #[tokio::test]
    async fn test_unreachable_index_degrades_without_recording() {
        let (pipeline, sessions) =
            build_pipeline(FakeIndex::unreachable(), counting_completion());

        let response = pipeline.ask_question("berapa ml hydra gel?", None).await;

        assert_eq!(response.answer, DB_UNREACHABLE_MESSAGE);
        assert_eq!(response.total_matches, 0);
        assert_eq!(response.product_detected, None);
        assert_eq!(sessions.stats().total_messages, 0);
    }

    #[tokio::test]
    async fn test_session_carries_product_across_turns() {
        let index = FakeIndex::new(vec![
            vec![],
            vec![chunk(GEL, "Overview", "150 ml gel ringan.")],
        ]);
        let (pipeline, sessions) = build_pipeline(index, counting_completion());

        let response = pipeline
            .ask_question("berapa ml supreme advanced hydra gel?", None)
            .await;

        let context = sessions.get_context(&response.session_id);
        assert!(context.contains(&format!("{} {}", CURRENT_PRODUCT_LABEL, GEL)));
        assert!(context.contains("User: berapa ml supreme advanced hydra gel?"));
        assert!(context.contains("Assistant:"));
    }

    #[tokio::test]
    async fn test_supplied_session_id_is_reused() {
        let index = FakeIndex::new(vec![]);
        let (pipeline, _) = build_pipeline(index, counting_completion());

        let response = pipeline
            .ask_question("halo", Some("session_test_1".to_string()))
            .await;

        assert_eq!(response.session_id, "session_test_1");
    }
}
