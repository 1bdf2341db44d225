//! Retrieval orchestration: wide fetch, filtering, section forcing,
//! expansion round, ranking.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::ProductRef;
use crate::core::errors::ApiError;
use crate::providers::embedding::normalize_query;
use crate::providers::EmbeddingProvider;
use crate::query::QueryExpander;
use crate::search::index::{SearchMatch, VectorIndex};

/// Questions with these phrases need the Overview section (volume,
/// weight and size facts live there).
const OVERVIEW_TRIGGERS: [&str; 7] = [
    "berapa ml",
    "berapa g",
    "berapa gr",
    "berapa gram",
    "volume",
    "berat",
    "ukuran",
];

/// Questions with these phrases need the "Cara Pakai" section.
const USAGE_SECTION_TRIGGERS: [&str; 5] = [
    "cara menggunakan",
    "cara pakai",
    "how to use",
    "gimana",
    "bagaimana",
];

/// Usage questions always get the expansion round; their phrasing
/// rarely matches the stored instruction chunks directly.
const EXPANSION_TRIGGERS: [&str; 5] = [
    "cara menggunakan",
    "cara pakai",
    "how to use",
    "penggunaan",
    "instructions",
];

/// Retrieval tuning. All thresholds are empirical; they are fields
/// (not inline literals) so boundary behavior can be asserted exactly.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default result cap.
    pub top_k: usize,
    /// Lower bound on the initial fetch width.
    pub min_fetch_width: usize,
    /// Candidates scoring below this are dropped as noise.
    pub noise_floor: f32,
    /// Run the expansion round when fewer matches than this survive.
    pub expansion_floor: usize,
    /// Fetch width for each expansion query.
    pub expansion_width: usize,
    /// Expansion queries issued at most.
    pub max_expansions: usize,
    /// A needed section must appear within this many leading results,
    /// otherwise one matching candidate is forced to the top.
    pub forced_section_window: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            min_fetch_width: 200,
            noise_floor: 0.1,
            expansion_floor: 8,
            expansion_width: 20,
            max_expansions: 2,
            forced_section_window: 5,
        }
    }
}

pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    expander: QueryExpander,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        expander: QueryExpander,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            expander,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs the full retrieval pass for one question.
    ///
    /// Result is deduplicated by id, capped at `top_k` and sorted by
    /// score descending, except that one section-forced candidate may
    /// occupy position 0 regardless of its score.
    pub async fn search(
        &self,
        question: &str,
        index: &dyn VectorIndex,
        product_filter: Option<&ProductRef>,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, ApiError> {
        let q_lower = question.to_lowercase();
        let analysis = self.expander.analyze(question);
        let fetch_width = analysis.fetch_width.max(self.config.min_fetch_width);

        tracing::debug!(
            list = analysis.is_list_question,
            composition = analysis.is_composition_search,
            fetch_width,
            "search strategy"
        );

        let query_embedding = self.embedder.embed(&normalize_query(question)).await?;
        let results = index.query(&query_embedding, fetch_width).await?;

        let needs_overview = OVERVIEW_TRIGGERS.iter().any(|t| q_lower.contains(t));
        let needs_usage = USAGE_SECTION_TRIGGERS.iter().any(|t| q_lower.contains(t));

        let mut all_matches: Vec<SearchMatch> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut overview_chunks: Vec<SearchMatch> = Vec::new();
        let mut usage_chunks: Vec<SearchMatch> = Vec::new();

        for m in results {
            if !product_matches(product_filter, &m) {
                continue;
            }

            let section_lower = m.metadata.section.to_lowercase();
            if needs_overview && section_lower == "overview" {
                overview_chunks.push(m.clone());
            }
            if needs_usage && section_lower == "cara pakai" {
                usage_chunks.push(m.clone());
            }

            if m.score < self.config.noise_floor {
                tracing::debug!(id = %m.id, score = m.score, "dropping low-score match");
                continue;
            }

            if seen_ids.insert(m.id.clone()) {
                all_matches.push(m);
            }
        }

        // The generic semantic score often under-ranks the section that
        // holds the literal answer; pull one matching chunk out so it
        // survives ranking at position 0.
        let mut forced: Option<SearchMatch> = None;
        if needs_overview {
            forced = self.take_forced_section(&mut all_matches, &overview_chunks, "overview");
        }
        if forced.is_none() && needs_usage {
            forced = self.take_forced_section(&mut all_matches, &usage_chunks, "cara pakai");
        }

        // Expansion round: thin results or usage phrasing warrant extra
        // queries with augmented vocabulary.
        let wants_expansion = all_matches.len() < self.config.expansion_floor
            || EXPANSION_TRIGGERS.iter().any(|t| q_lower.contains(t));
        if wants_expansion {
            let expansions: Vec<String> = self
                .expander
                .expand(question)
                .into_iter()
                .filter(|q| q != question)
                .take(self.config.max_expansions)
                .collect();

            for exp_query in expansions {
                tracing::debug!(query = %exp_query, "expansion query");
                let exp_embedding = self.embedder.embed(&normalize_query(&exp_query)).await?;
                let exp_results = index
                    .query(&exp_embedding, self.config.expansion_width)
                    .await?;

                for m in exp_results {
                    if !product_matches(product_filter, &m) {
                        continue;
                    }
                    let duplicate_of_forced =
                        forced.as_ref().map_or(false, |f| f.id == m.id);
                    if !duplicate_of_forced && seen_ids.insert(m.id.clone()) {
                        all_matches.push(m);
                    }
                }
            }
        }

        // Stable sort keeps insertion order for equal scores.
        all_matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(f) = forced {
            tracing::debug!(id = %f.id, score = f.score, "forcing section to top");
            all_matches.insert(0, f);
        }

        all_matches.truncate(top_k);
        Ok(all_matches)
    }

    /// Removes and returns the first `section` candidate if none sits
    /// within the leading window already.
    fn take_forced_section(
        &self,
        all_matches: &mut Vec<SearchMatch>,
        section_chunks: &[SearchMatch],
        section: &str,
    ) -> Option<SearchMatch> {
        if section_chunks.is_empty() {
            return None;
        }
        let window = self.config.forced_section_window.min(all_matches.len());
        let already_present = all_matches[..window]
            .iter()
            .any(|m| m.metadata.section.to_lowercase() == section);
        if already_present {
            return None;
        }

        let candidate = section_chunks.first()?;
        if let Some(pos) = all_matches.iter().position(|m| m.id == candidate.id) {
            Some(all_matches.remove(pos))
        } else {
            // Was filtered by the noise floor; resurrect it, the
            // section heuristic outranks the score heuristic.
            Some(candidate.clone())
        }
    }
}

fn product_matches(filter: Option<&ProductRef>, m: &SearchMatch) -> bool {
    match filter {
        None => true,
        // Generic means catalog-wide: no product filtering.
        Some(ProductRef::Generic) => true,
        Some(ProductRef::Named(name)) => m.metadata.product == *name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::providers::embedding::HashEmbedding;

    /// Replays canned responses, one per `query` call.
    struct FakeIndex {
        responses: Mutex<Vec<Vec<SearchMatch>>>,
        calls: Mutex<Vec<usize>>,
    }

    impl FakeIndex {
        fn new(responses: Vec<Vec<SearchMatch>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_widths(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<SearchMatch>, ApiError> {
            self.calls.lock().unwrap().push(top_k);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn chunk(id: &str, score: f32, product: &str, section: &str, text: &str) -> SearchMatch {
        SearchMatch::from_raw(
            id.to_string(),
            score,
            Some(json!({
                "product": product,
                "section": section,
                "chunk_text": text,
            })),
        )
    }

    fn engine() -> SearchEngine {
        SearchEngine::new(
            Arc::new(HashEmbedding::new()),
            QueryExpander::default(),
            SearchConfig::default(),
        )
    }

    const GEL: &str = "Crystallure Supreme Advanced Hydra Gel";
    const FOAM: &str = "Crystallure Moisture Rich Cleansing Foam";

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = FakeIndex::new(vec![]);
        let matches = engine().search("halo", &index, None, 15).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_product_filter_drops_other_products() {
        let index = FakeIndex::new(vec![vec![
            chunk("a", 0.9, GEL, "Overview", "150 ml"),
            chunk("b", 0.8, FOAM, "Overview", "100 ml"),
        ]]);
        let filter = ProductRef::Named(GEL.to_string());
        let matches = engine()
            .search("ada info?", &index, Some(&filter), 15)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_generic_filter_matches_everything() {
        let index = FakeIndex::new(vec![vec![
            chunk("a", 0.9, GEL, "Overview", "150 ml"),
            chunk("b", 0.8, FOAM, "Overview", "100 ml"),
        ]]);
        let matches = engine()
            .search("ada info?", &index, Some(&ProductRef::Generic), 15)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_noise_floor_drops_low_scores() {
        let index = FakeIndex::new(vec![vec![
            chunk("a", 0.9, GEL, "Overview", "150 ml"),
            chunk("b", 0.05, FOAM, "Overview", "100 ml"),
        ]]);
        let matches = engine().search("ada info?", &index, None, 15).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_dedup_across_primary_and_expansion() {
        // Thin primary response triggers the expansion round; the
        // expansion replays overlapping ids.
        let primary = vec![chunk("a", 0.9, GEL, "Overview", "150 ml")];
        let expansion = vec![
            chunk("a", 0.9, GEL, "Overview", "150 ml"),
            chunk("b", 0.7, GEL, "Manfaat", "melembabkan"),
        ];
        let index = FakeIndex::new(vec![primary, expansion]);
        let matches = engine()
            .search("berapa harga hydra gel?", &index, None, 15)
            .await
            .unwrap();
        let mut ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), matches.len(), "duplicate ids in result");
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_results_sorted_by_score_descending() {
        let index = FakeIndex::new(vec![vec![
            chunk("lo", 0.3, GEL, "Manfaat", "x"),
            chunk("hi", 0.9, GEL, "Manfaat", "y"),
            chunk("mid", 0.6, GEL, "Manfaat", "z"),
        ]]);
        let matches = engine().search("ada info?", &index, None, 15).await.unwrap();
        let scores: Vec<f32> = matches.iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.3]);
    }

    #[tokio::test]
    async fn test_top_k_cap() {
        let many: Vec<SearchMatch> = (0..30)
            .map(|i| chunk(&format!("c{}", i), 0.9 - i as f32 * 0.01, GEL, "Manfaat", "x"))
            .collect();
        let index = FakeIndex::new(vec![many]);
        let matches = engine().search("ada info?", &index, None, 7).await.unwrap();
        assert_eq!(matches.len(), 7);
    }

    #[tokio::test]
    async fn test_overview_forced_to_top_for_volume_question() {
        // Ten strong non-Overview chunks push the Overview chunk far
        // outside the leading window.
        let mut primary: Vec<SearchMatch> = (0..10)
            .map(|i| {
                chunk(
                    &format!("m{}", i),
                    0.9 - i as f32 * 0.01,
                    GEL,
                    "Manfaat",
                    "melembabkan kulit",
                )
            })
            .collect();
        primary.push(chunk("ov", 0.2, GEL, "Overview", "150 ml Hydra Gel"));
        let index = FakeIndex::new(vec![primary]);

        let matches = engine()
            .search("berapa ml hydra gel?", &index, None, 15)
            .await
            .unwrap();

        assert_eq!(matches[0].id, "ov", "Overview chunk must be forced to top");
        // The rest is still score-ordered.
        let rest: Vec<f32> = matches[1..].iter().map(|m| m.score).collect();
        let mut sorted = rest.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(rest, sorted);
        // And the forced chunk is not duplicated.
        assert_eq!(matches.iter().filter(|m| m.id == "ov").count(), 1);
    }

    #[tokio::test]
    async fn test_no_forcing_when_overview_already_on_top() {
        let index = FakeIndex::new(vec![vec![
            chunk("ov", 0.9, GEL, "Overview", "150 ml"),
            chunk("m1", 0.8, GEL, "Manfaat", "x"),
        ]]);
        let matches = engine()
            .search("berapa ml hydra gel?", &index, None, 15)
            .await
            .unwrap();
        assert_eq!(matches[0].id, "ov");
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_usage_question_always_expands() {
        // Plenty of primary matches, but usage phrasing still issues
        // expansion queries.
        let primary: Vec<SearchMatch> = (0..10)
            .map(|i| chunk(&format!("m{}", i), 0.9, GEL, "Cara Pakai", "1. Aplikasikan"))
            .collect();
        let index = FakeIndex::new(vec![primary, vec![], vec![]]);
        let _ = engine()
            .search("bagaimana cara pakai hydra gel?", &index, None, 15)
            .await
            .unwrap();
        let widths = index.call_widths();
        assert!(widths.len() >= 2, "expected expansion queries, got {:?}", widths);
        assert_eq!(widths[1], 20);
    }

    #[tokio::test]
    async fn test_initial_fetch_width_has_minimum() {
        let index = FakeIndex::new(vec![vec![]]);
        let _ = engine().search("halo", &index, None, 15).await.unwrap();
        assert!(index.call_widths()[0] >= 200);
    }
}
