//! Product catalog and product-name extraction.
//!
//! Holds the set of known product names and resolves which product a
//! free-text question is about. Extraction runs three tiers: exact
//! substring, word-overlap scoring, then a fuzzy fallback; the
//! context-aware variant adds a priority tier for direct mentions and
//! conversational anaphora ("yang tadi", "harganya berapa").

use std::sync::{OnceLock, RwLock};

use regex::Regex;
use serde::Serialize;

use crate::providers::embedding::EMBEDDING_DIMENSION;
use crate::query::LIST_TRIGGERS;
use crate::search::index::VectorIndex;

/// Label the session store writes and the catalog reads back when
/// resolving follow-up questions from conversation context.
pub const CURRENT_PRODUCT_LABEL: &str = "Produk yang sedang dibicarakan:";

/// The brand word shared by every product name.
pub const BRAND_TOKEN: &str = "crystallure";

/// Shipped product list, used until (and whenever) the index cannot be
/// sampled.
const FALLBACK_PRODUCTS: [&str; 16] = [
    "Crystallure Moisture Rich Cleansing Foam",
    "Crystallure Supreme Double Action Micellar Gel",
    "Crystallure Precious All Day Corrective Concealer",
    "Crystallure Precious Lustre Prism Blush",
    "Crystallure Precious Lustre Prism Eyeshadow",
    "Crystallure Precious Lustre Prism Lipstick",
    "Crystallure Supreme Advanced Hydra Gel",
    "Crystallure Supreme Activating Overnight Cream",
    "Crystallure Supreme Revitalizing Rich Cream",
    "Crystallure Dual Refining Treatment Solution",
    "Crystallure Precious Luminizing Silk Powder Foundation",
    "Crystallure Supreme Advanced Eye Serum",
    "Crystallure Supreme Activating Booster Essence",
    "Crystallure Precious Liquid Lip Couture",
    "Crystallure Precious Glow Radiance Powder",
    "Crystallure Supreme Revitalizing Oil Serum",
];

/// Product-name stopwords skipped during word-overlap scoring.
const NAME_STOPWORDS: [&str; 3] = ["for", "and", "the"];

/// Question words stripped before the fuzzy fallback tier.
const QUESTION_STOPWORDS: &str =
    r"\b(berapa|apa|untuk|yang|adalah|tentang|bagaimana|kapan|siapa|dimana|crystallure)\b";

/// Anaphora and category cues that make a question lean on context.
const REFERENCE_WORDS: [&str; 12] = [
    "itu",
    "tadi",
    "sebelumnya",
    "yang",
    "produk",
    "item",
    "berapa",
    "harga",
    "cara",
    "keunggulan",
    "tersebut",
    "nya",
];

/// Result of product extraction.
///
/// `Generic` means "the brand as a whole" — a catalog-listing question,
/// or a filter that matches every product. It is deliberately a
/// distinct variant instead of a magic product string so callers cannot
/// confuse it with a real catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProductRef {
    Generic,
    Named(String),
}

impl ProductRef {
    pub fn is_generic(&self) -> bool {
        matches!(self, ProductRef::Generic)
    }

    /// Display name; the generic variant renders as the brand.
    pub fn name(&self) -> &str {
        match self {
            ProductRef::Generic => "Crystallure",
            ProductRef::Named(name) => name,
        }
    }
}

/// Tuning for the extraction tiers.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Minimum word-overlap score for tier 2 (inclusive).
    pub overlap_threshold: f32,
    /// Minimum matched-word share for the fuzzy tier (inclusive).
    pub fuzzy_threshold: f32,
    /// Words this short or shorter are ignored when scoring names.
    pub min_word_len: usize,
    /// How many records to sample when loading names from the index.
    pub sample_width: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.40,
            fuzzy_threshold: 0.40,
            min_word_len: 2,
            sample_width: 100,
        }
    }
}

pub struct ProductCatalog {
    names: RwLock<Vec<String>>,
    config: CatalogConfig,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl ProductCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        let names = FALLBACK_PRODUCTS.iter().map(|s| s.to_string()).collect();
        Self {
            names: RwLock::new(names),
            config,
        }
    }

    #[cfg(test)]
    pub fn with_names(names: Vec<String>) -> Self {
        Self {
            names: RwLock::new(names),
            config: CatalogConfig::default(),
        }
    }

    /// Current product names, sorted copies not guaranteed.
    pub fn names(&self) -> Vec<String> {
        self.names.read().expect("catalog lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.names.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort refresh of the product set from the index.
    ///
    /// Samples the namespace with a zero vector and collects distinct
    /// `product` metadata values. The in-memory set is replaced in one
    /// swap; on any failure (or an empty sample) the previous set is
    /// kept and the error is only logged.
    pub async fn reload(&self, index: &dyn VectorIndex) {
        let probe = vec![0.0f32; EMBEDDING_DIMENSION];
        match index.query(&probe, self.config.sample_width).await {
            Ok(matches) => {
                let mut discovered: Vec<String> = Vec::new();
                for m in &matches {
                    let product = m.metadata.product.trim();
                    if product.is_empty() || product == "Unknown" {
                        continue;
                    }
                    if !discovered.iter().any(|p| p == product) {
                        discovered.push(product.to_string());
                    }
                }
                if discovered.is_empty() {
                    tracing::warn!("Product sample returned no names; keeping previous set");
                    return;
                }
                tracing::info!("Loaded {} products from index", discovered.len());
                *self.names.write().expect("catalog lock poisoned") = discovered;
            }
            Err(err) => {
                tracing::warn!("Could not load products from index: {}; keeping previous set", err);
            }
        }
    }

    /// Three-tier product extraction; first successful tier wins.
    pub fn extract(&self, question: &str) -> Option<String> {
        let q_lower = question.to_lowercase();
        let names = self.names.read().expect("catalog lock poisoned");

        if let Some(hit) = exact_match(&q_lower, &names) {
            return Some(hit);
        }
        if let Some(hit) = self.overlap_match(&q_lower, &names) {
            return Some(hit);
        }
        self.fuzzy_match(&q_lower, &names)
    }

    /// Context-aware extraction, tried ahead of plain tiers:
    /// catalog-listing questions resolve to the generic brand, direct
    /// mentions always override context, then anaphora fall back to the
    /// product the conversation is already about.
    pub fn extract_with_context(
        &self,
        question: &str,
        conversation_context: Option<&str>,
    ) -> Option<ProductRef> {
        let q_lower = question.to_lowercase();

        // "apa aja produk crystallure" is about the catalog, not any
        // one product.
        let is_list_question = LIST_TRIGGERS.iter().any(|t| q_lower.contains(t));
        if is_list_question && q_lower.contains(BRAND_TOKEN) {
            return Some(ProductRef::Generic);
        }

        let names = self.names.read().expect("catalog lock poisoned");

        // A direct mention (full name or the name minus the brand word)
        // always wins over whatever the conversation was about.
        let mut direct: Option<&String> = None;
        for product in names.iter() {
            let product_lower = product.to_lowercase();
            let cleaned = product_lower.replace(BRAND_TOKEN, "").trim().to_string();
            let mentioned = q_lower.contains(&product_lower)
                || (!cleaned.is_empty() && q_lower.contains(&cleaned));
            if mentioned && direct.map_or(true, |best| product.len() > best.len()) {
                direct = Some(product);
            }
        }
        if let Some(product) = direct {
            return Some(ProductRef::Named(product.clone()));
        }

        let context = match conversation_context {
            Some(ctx) if !ctx.is_empty() => ctx,
            _ => return None,
        };

        let has_reference = REFERENCE_WORDS.iter().any(|w| q_lower.contains(w));
        if has_reference {
            for line in context.lines() {
                if let Some(rest) = line.strip_prefix(CURRENT_PRODUCT_LABEL) {
                    let last_product = rest.trim();
                    if !last_product.is_empty()
                        && last_product != "null"
                        && !last_product.eq_ignore_ascii_case("crystallure")
                    {
                        return Some(ProductRef::Named(last_product.to_string()));
                    }
                }
            }
        }

        // Last resort: any catalog name appearing anywhere in the
        // conversation text.
        for line in context.lines() {
            let line_lower = line.to_lowercase();
            for product in names.iter() {
                if !product.eq_ignore_ascii_case(BRAND_TOKEN)
                    && line_lower.contains(&product.to_lowercase())
                {
                    return Some(ProductRef::Named(product.clone()));
                }
            }
        }

        None
    }

    /// Tier 2: share of a product's distinguishing words present in
    /// the question, whole-word matched.
    fn overlap_match(&self, q_lower: &str, names: &[String]) -> Option<String> {
        let mut best_match: Option<&String> = None;
        let mut best_score = 0.0f32;
        let mut best_word_count = 0usize;

        for product in names {
            let product_lower = product.to_lowercase();
            let stripped = product_lower.replace(BRAND_TOKEN, "");
            let words: Vec<&str> = stripped
                .split_whitespace()
                .filter(|w| w.len() > self.config.min_word_len && !NAME_STOPWORDS.contains(w))
                .collect();
            if words.is_empty() {
                continue;
            }

            let matched = words
                .iter()
                .filter(|w| contains_whole_word(q_lower, w))
                .count();
            if matched == 0 {
                continue;
            }
            let score = matched as f32 / words.len() as f32;

            let is_better = score > best_score
                || (score == best_score && matched > best_word_count)
                || (score == best_score
                    && matched == best_word_count
                    && product.len() > best_match.map_or(0, |b| b.len()));
            if is_better {
                best_score = score;
                best_word_count = matched;
                best_match = Some(product);
            }
        }

        if best_score >= self.config.overlap_threshold {
            best_match.cloned()
        } else {
            None
        }
    }

    /// Tier 3: strip question words, then accept the first product
    /// whose cleaned name overlaps the remainder enough. Catches typo'd
    /// or loosely phrased mentions tier 2 scores too low.
    fn fuzzy_match(&self, q_lower: &str, names: &[String]) -> Option<String> {
        let question_clean = question_stopword_re()
            .replace_all(q_lower, "")
            .trim()
            .to_string();
        if question_clean.len() <= 3 {
            return None;
        }

        for product in names {
            let cleaned = product
                .to_lowercase()
                .replace(BRAND_TOKEN, "")
                .trim()
                .to_string();
            if cleaned.is_empty() {
                continue;
            }
            let words: Vec<&str> = cleaned
                .split_whitespace()
                .filter(|w| w.len() > self.config.min_word_len)
                .collect();
            if words.is_empty() {
                continue;
            }
            let matched = words
                .iter()
                .filter(|w| question_clean.contains(*w))
                .count();
            if matched as f32 >= words.len() as f32 * self.config.fuzzy_threshold {
                return Some(product.clone());
            }
        }

        None
    }
}

/// Tier 1: full product name appears verbatim; longest match is the
/// most specific.
fn exact_match(q_lower: &str, names: &[String]) -> Option<String> {
    names
        .iter()
        .filter(|p| q_lower.contains(&p.to_lowercase()))
        .max_by_key(|p| p.len())
        .cloned()
}

fn contains_whole_word(haystack: &str, word: &str) -> bool {
    match Regex::new(&format!(r"\b{}\b", regex::escape(word))) {
        Ok(re) => re.is_match(haystack),
        Err(_) => false,
    }
}

fn question_stopword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUESTION_STOPWORDS).expect("static regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProductCatalog {
        ProductCatalog::default()
    }

    #[test]
    fn test_exact_match_any_case() {
        let c = catalog();
        let got = c.extract("Berapa harga CRYSTALLURE SUPREME ADVANCED HYDRA GEL?");
        assert_eq!(got.as_deref(), Some("Crystallure Supreme Advanced Hydra Gel"));
    }

    #[test]
    fn test_exact_match_prefers_longest() {
        let c = ProductCatalog::with_names(vec![
            "Crystallure Supreme Advanced Eye Serum".to_string(),
            "Crystallure Supreme Advanced Eye Serum Deluxe".to_string(),
        ]);
        let got = c.extract("review crystallure supreme advanced eye serum deluxe dong");
        assert_eq!(
            got.as_deref(),
            Some("Crystallure Supreme Advanced Eye Serum Deluxe")
        );
    }

    #[test]
    fn test_word_overlap_at_threshold_passes() {
        // "Supreme Advanced Hydra Gel" has 4 scoring words; 2 matched
        // words is exactly 0.5 >= 0.4. Use a name where 2/5 = 0.4.
        let c = ProductCatalog::with_names(vec![
            "Crystallure Precious Luminizing Silk Powder Foundation".to_string(),
        ]);
        // 5 scoring words: precious luminizing silk powder foundation.
        // Two of them present -> score exactly 0.4.
        let got = c.extract("ada powder foundation ga?");
        assert_eq!(
            got.as_deref(),
            Some("Crystallure Precious Luminizing Silk Powder Foundation")
        );
    }

    #[test]
    fn test_word_overlap_below_threshold_returns_none() {
        let c = ProductCatalog::with_names(vec![
            "Crystallure Precious Luminizing Silk Powder Foundation".to_string(),
        ]);
        // One of five words -> 0.2 < 0.4, and the fuzzy tier sees the
        // same 1/5 share.
        assert_eq!(c.extract("ada powder ga?"), None);
    }

    #[test]
    fn test_word_overlap_requires_whole_words() {
        let c = ProductCatalog::with_names(vec![
            "Crystallure Precious Lustre Prism Blush".to_string(),
        ]);
        // "prisma" contains "prism" only as a substring; one fuzzy hit
        // out of four words stays below the fuzzy threshold too.
        assert_eq!(c.extract("warna prisma bagus"), None);
    }

    #[test]
    fn test_word_overlap_prefers_higher_score() {
        let c = ProductCatalog::with_names(vec![
            "Crystallure Hydra Gel".to_string(),
            "Crystallure Advanced Hydra Gel Supreme".to_string(),
        ]);
        // First name: 2/2 matched (1.0). Second: 3/4 (0.75). Higher
        // score wins even though the other matches more words.
        let got = c.extract("hydra gel yang advanced itu bagus?");
        assert_eq!(got.as_deref(), Some("Crystallure Hydra Gel"));
    }

    #[test]
    fn test_fuzzy_fallback_catches_loose_mention() {
        let c = ProductCatalog::with_names(vec![
            "Crystallure Supreme Revitalizing Oil Serum".to_string(),
        ]);
        // Glued typo defeats whole-word tier 2 (only "serum" matches,
        // 1/4), but the fuzzy tier's substring containment still finds
        // 3 of 4 name words in the cleaned question.
        let got = c.extract("tentang revitalizingoil serum dong");
        assert_eq!(
            got.as_deref(),
            Some("Crystallure Supreme Revitalizing Oil Serum")
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        assert_eq!(catalog().extract("cuaca hari ini gimana?"), None);
    }

    #[test]
    fn test_context_list_question_is_generic() {
        let got = catalog().extract_with_context("apa aja produk crystallure?", None);
        assert_eq!(got, Some(ProductRef::Generic));
    }

    #[test]
    fn test_direct_mention_overrides_context() {
        let c = catalog();
        let context = format!(
            "{} Crystallure Supreme Advanced Eye Serum\nUser: harganya berapa?\n",
            CURRENT_PRODUCT_LABEL
        );
        let got = c.extract_with_context(
            "kalau precious lustre prism blush berapa?",
            Some(&context),
        );
        assert_eq!(
            got,
            Some(ProductRef::Named(
                "Crystallure Precious Lustre Prism Blush".to_string()
            ))
        );
    }

    #[test]
    fn test_reference_word_uses_context_product() {
        let c = catalog();
        let context = format!(
            "{} Crystallure Supreme Advanced Hydra Gel\nUser: ada apa aja?\n",
            CURRENT_PRODUCT_LABEL
        );
        let got = c.extract_with_context("berapa harganya?", Some(&context));
        assert_eq!(
            got,
            Some(ProductRef::Named(
                "Crystallure Supreme Advanced Hydra Gel".to_string()
            ))
        );
    }

    #[test]
    fn test_generic_context_product_is_ignored() {
        let c = catalog();
        let context = format!("{} Crystallure\n", CURRENT_PRODUCT_LABEL);
        assert_eq!(c.extract_with_context("berapa harganya?", Some(&context)), None);
    }

    #[test]
    fn test_context_scan_finds_product_in_history() {
        let c = catalog();
        let context =
            "User: ceritakan tentang Crystallure Precious Liquid Lip Couture\n".to_string();
        let got = c.extract_with_context("warnanya itu apa aja sih", Some(&context));
        assert_eq!(
            got,
            Some(ProductRef::Named(
                "Crystallure Precious Liquid Lip Couture".to_string()
            ))
        );
    }

    #[test]
    fn test_no_context_no_mention_returns_none() {
        assert_eq!(catalog().extract_with_context("berapa harganya?", None), None);
    }
}
