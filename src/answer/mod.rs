//! Answer composition: catalog listing, pattern extraction, language
//! model fallback.
//!
//! `compose` is infallible by contract. Every failure mode downstream
//! of retrieval degrades to a fixed Indonesian fallback sentence so the
//! caller never has to branch on errors.

pub mod patterns;

use std::sync::Arc;

use crate::catalog::{ProductCatalog, ProductRef, CURRENT_PRODUCT_LABEL};
use crate::providers::{CompletionProvider, SamplingConfig};
use crate::search::index::SearchMatch;

pub const NO_PRODUCTS_MESSAGE: &str = "Maaf, tidak ada informasi produk yang tersedia.";
pub const EMPTY_COMPLETION_MESSAGE: &str = "Maaf, tidak dapat menghasilkan jawaban.";
pub const COMPLETION_FAILURE_MESSAGE: &str =
    "Maaf, terjadi kesalahan saat memproses pertanyaan Anda.";

/// Composition/technology questions search across products, so the
/// conversation's current product must not narrow the match set.
const SPECIFIC_SEARCH_TRIGGERS: [&str; 9] = [
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

pub struct AnswerComposer {
    catalog: Arc<ProductCatalog>,
    completion: Arc<dyn CompletionProvider>,
    sampling: SamplingConfig,
}

impl AnswerComposer {
    pub fn new(catalog: Arc<ProductCatalog>, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            catalog,
            completion,
            sampling: SamplingConfig::default(),
        }
    }

    /// Produces the final answer for a question and its retrieved
    /// matches. Listing questions answer from the catalog, literal
    /// questions from the pattern table, everything else from the
    /// language model.
    pub async fn compose(
        &self,
        question: &str,
        matches: &[SearchMatch],
        conversation_context: Option<&str>,
    ) -> String {
        let q_lower = question.to_lowercase();

        if is_product_list_question(&q_lower) {
            return self.list_products();
        }

        let is_specific_search =
            SPECIFIC_SEARCH_TRIGGERS.iter().any(|t| q_lower.contains(t));

        let direct = if is_specific_search {
            patterns::extract_direct_answer(question, matches)
        } else {
            let scoped = scope_to_current_product(matches, conversation_context);
            patterns::extract_direct_answer(question, &scoped)
        };
        if let Some(answer) = direct {
            return answer;
        }

        let prompt = build_prompt(question, matches, conversation_context);
        match self.completion.complete(&prompt, &self.sampling).await {
            Ok(text) if text.is_empty() => EMPTY_COMPLETION_MESSAGE.to_string(),
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "completion call failed");
                COMPLETION_FAILURE_MESSAGE.to_string()
            }
        }
    }

    /// Numbered catalog listing, generic brand entry excluded.
    fn list_products(&self) -> String {
        let mut names: Vec<String> = self
            .catalog
            .names()
            .into_iter()
            .filter(|n| n != ProductRef::Generic.name())
            .collect();
        names.sort();

        if names.is_empty() {
            return NO_PRODUCTS_MESSAGE.to_string();
        }

        let mut response =
            String::from("Berikut adalah daftar produk dari Crystallure yang tersedia:\n\n");
        for (i, name) in names.iter().enumerate() {
            response.push_str(&format!("{}. {}\n", i + 1, name));
        }
        response
    }
}

fn is_product_list_question(q_lower: &str) -> bool {
    (q_lower.contains("apa aja")
        && (q_lower.contains("produk") || q_lower.contains("crystallure")))
        || q_lower.contains("produk apa")
        || q_lower.contains("daftar produk")
        || q_lower.contains("semua produk")
        || q_lower.contains("produk dari")
        || q_lower.contains("produk crystallure")
        || (q_lower.contains("produk")
            && q_lower.contains("crystallure")
            && !q_lower.contains("ingredient")
            && !q_lower.contains("kandungan")
            && !q_lower.contains("cara"))
}

/// Restricts matches to the product the conversation is currently
/// about, when the context names one. No current product or no
/// surviving match means the full set is used unchanged.
fn scope_to_current_product(
    matches: &[SearchMatch],
    conversation_context: Option<&str>,
) -> Vec<SearchMatch> {
    let current = conversation_context.and_then(|ctx| {
        ctx.lines()
            .find(|line| line.contains(CURRENT_PRODUCT_LABEL))
            .map(|line| line.replace(CURRENT_PRODUCT_LABEL, "").trim().to_string())
    });

    match current {
        Some(product) if product != "null" && !product.is_empty() => {
            let filtered: Vec<SearchMatch> = matches
                .iter()
                .filter(|m| m.metadata.product == product)
                .cloned()
                .collect();
            tracing::debug!(product = %product, kept = filtered.len(), "scoped matches to current product");
            filtered
        }
        _ => matches.to_vec(),
    }
}

/// Renders retrieved chunks as numbered, product-and-section annotated
/// blocks for the model prompt.
pub fn prepare_context(matches: &[SearchMatch]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "[INFO {}] Product: {} | Section: {}\n{}",
                i + 1,
                m.metadata.product,
                m.metadata.section,
                m.metadata.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(
    question: &str,
    matches: &[SearchMatch],
    conversation_context: Option<&str>,
) -> String {
    let context = prepare_context(matches);

    let mut prompt = format!(
        "Jawab pertanyaan berdasarkan informasi di bawah. PENTING: Baca semua informasi dengan teliti!\n\n\
         INFORMASI:\n{}\n\nPERTANYAAN: {}",
        context, question
    );

    if let Some(ctx) = conversation_context {
        prompt.push_str(&format!("\n\nKONTEKS PERCAKAPAN:\n{}", ctx));
    }

    prompt.push_str(
        "\n\nINSTRUKSI:\n\
         - Cari angka/nilai yang tepat (ml, gram, gr, g, Rp, %, dll)\n\
         - Jika ada angka di awal kalimat seperti \"12 gr\" atau \"150 ml\", SEBUTKAN angka tersebut\n\
         - Contoh: \"12 gr Bedak...\" berarti beratnya adalah 12 gr\n\
         - Untuk pertanyaan \"apa aja produk crystallure\", CARI semua nama produk yang unik dari informasi yang diberikan dan buat daftar lengkap\n\
         - Untuk pertanyaan \"ingredientsnya\" atau \"kandungannya\", berikan daftar lengkap ingredients dari produk yang sedang dibicarakan\n",
    );
    if conversation_context.is_some() {
        prompt.push_str(
            "- Jika ada konteks percakapan, gunakan untuk memahami referensi seperti \"itu\", \"tadi\", \"sebelumnya\"\n\
             - Berikan jawaban yang natural dan mengalir berdasarkan konteks percakapan\n",
        );
    }
    prompt.push_str(
        "- PENTING: Untuk daftar produk, ekstrak semua nama produk unik dari metadata \"Product\" yang ada di informasi\n\
         - JANGAN katakan \"Informasi tidak tersedia\" kecuali benar-benar tidak ada informasi sama sekali\n\n\
         JAWABAN:",
    );

    prompt
}
