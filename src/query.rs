//! Query expansion and per-question analysis.
//!
//! Expansion widens recall for known question categories by appending
//! category keywords to the original question; the hash embedding has
//! no real semantic generalization, so differently-worded chunks are
//! only reachable through shared vocabulary.

use serde::Serialize;

/// Phrases that mark a catalog-listing question. Shared with product
/// extraction, which maps them to the generic brand reference.
pub const LIST_TRIGGERS: [&str; 6] = [
    "apa aja",
    "produk apa",
    "daftar produk",
    "semua produk",
    "produk dari",
    "produk crystallure",
];

const COMPOSITION_TRIGGERS: [&str; 9] = [
    "mengandung",
    "kandungan",
    "ingredient",
    "komposisi",
    "bahan",
    "apa yang mengandung",
    "yang dilengkapi",
    "yang menggunakan",
    "teknologi",
];

const INGREDIENT_SUFFIX_TRIGGERS: [&str; 4] = [
    "ingredientsnya",
    "kandungannya",
    "ingredientnya",
    "komposisinya",
];

/// One expansion category: any trigger present appends the keyword
/// suffix to the original question. Checked in declaration order; each
/// category contributes at most one expansion.
struct ExpansionRule {
    triggers: &'static [&'static str],
    suffix: &'static str,
}

const EXPANSION_RULES: [ExpansionRule; 8] = [
    ExpansionRule {
        triggers: &["berapa ml", "volume", "ukuran", "size"],
        suffix: "ml volume ukuran overview",
    },
    ExpansionRule {
        triggers: &["berapa g", "berapa gram", "berat", "gram", " g ", "berapa gr"],
        suffix: "gram berat g gr overview",
    },
    ExpansionRule {
        triggers: &["harga", "price", "biaya"],
        suffix: "harga price overview",
    },
    ExpansionRule {
        triggers: &["cara pakai", "cara menggunakan", "how to use", "gimana", "bagaimana"],
        suffix: "cara pakai cara menggunakan penggunaan instructions how to use step by step tutorial",
    },
    ExpansionRule {
        triggers: &["manfaat", "benefit", "kegunaan", "fungsi"],
        suffix: "manfaat benefit kegunaan",
    },
    ExpansionRule {
        triggers: &["mengandung", "kandungan", "ingredient", "komposisi", "bahan"],
        suffix: "kandungan ingredient komposisi bahan aktif",
    },
    ExpansionRule {
        triggers: &["usia", "umur", "age", "untuk usia"],
        suffix: "usia umur age recommended",
    },
    ExpansionRule {
        triggers: &LIST_TRIGGERS,
        suffix: "overview daftar produk list semua produk",
    },
];

/// Per-question classification driving fetch width and search strategy.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnalysis {
    /// "list every product" question.
    pub is_list_question: bool,
    /// Composition/technology search across products.
    pub is_composition_search: bool,
    /// Possessive ingredient question about the current product
    /// ("ingredientsnya?").
    pub is_ingredient_question: bool,
    /// Mentions the brand at all.
    pub mentions_brand: bool,
    /// How many candidates to request from the index.
    pub fetch_width: usize,
}

/// Fetch widths per question category. Empirically chosen; kept as
/// named fields so boundary behavior is testable.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub list_fetch_width: usize,
    pub ingredient_fetch_width: usize,
    pub composition_fetch_width: usize,
    pub default_fetch_width: usize,
    /// Lower bound applied to every analysis result.
    pub fetch_floor: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            list_fetch_width: 500,
            ingredient_fetch_width: 400,
            composition_fetch_width: 300,
            default_fetch_width: 200,
            fetch_floor: 300,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    config: QueryConfig,
}

impl QueryExpander {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Expands a question into an ordered, non-empty query list.
    ///
    /// The original question always comes first; each matching category
    /// appends one augmented variant. No category match means only the
    /// original is returned.
    pub fn expand(&self, question: &str) -> Vec<String> {
        let q_lower = question.to_lowercase();
        let mut queries = vec![question.to_string()];

        for rule in &EXPANSION_RULES {
            if rule.triggers.iter().any(|t| q_lower.contains(t)) {
                queries.push(format!("{} {}", question, rule.suffix));
            }
        }

        queries
    }

    pub fn analyze(&self, question: &str) -> QuestionAnalysis {
        let q_lower = question.to_lowercase();

        let is_list_question = LIST_TRIGGERS.iter().any(|t| q_lower.contains(t));
        let is_composition_search =
            COMPOSITION_TRIGGERS.iter().any(|t| q_lower.contains(t));
        let is_ingredient_question =
            INGREDIENT_SUFFIX_TRIGGERS.iter().any(|t| q_lower.contains(t));
        let mentions_brand = q_lower.contains("crystallure");

        let width = if is_list_question {
            self.config.list_fetch_width
        } else if is_ingredient_question {
            self.config.ingredient_fetch_width
        } else if is_composition_search {
            self.config.composition_fetch_width
        } else {
            self.config.default_fetch_width
        };

        QuestionAnalysis {
            is_list_question,
            is_composition_search,
            is_ingredient_question,
            mentions_brand,
            fetch_width: width.max(self.config.fetch_floor),
        }
    }
}
