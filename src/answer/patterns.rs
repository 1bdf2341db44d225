//! Deterministic answer extraction.
//!
//! An ordered rule table maps question categories to text patterns over
//! the retrieved chunks. The first rule whose triggers match the
//! question and whose extractor finds a literal value wins; falling
//! through every rule means the caller escalates to the language model.

use std::sync::OnceLock;

use regex::Regex;

use crate::search::index::SearchMatch;

/// One extraction category. `triggers` gate on the lowercased
/// question; `extract` scans the ranked matches in order.
pub struct ExtractionRule {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub extract: fn(q_lower: &str, matches: &[SearchMatch]) -> Option<String>,
}

pub const EXTRACTION_RULES: [ExtractionRule; 11] = [
    ExtractionRule {
        name: "volume",
        triggers: &["berapa ml", "volume", "ukuran", "ml"],
        extract: extract_volume,
    },
    ExtractionRule {
        name: "weight",
        triggers: &["berapa g", "berapa gram", "berat", "gram", " g ", "berapa gr"],
        extract: extract_weight,
    },
    ExtractionRule {
        name: "price",
        triggers: &["harga", "price", "biaya"],
        extract: extract_price,
    },
    ExtractionRule {
        name: "usage",
        triggers: &[
            "cara pakai",
            "cara menggunakan",
            "how to use",
            "cara aplikasi",
            "cara memakai",
            "bagaimana cara",
        ],
        extract: extract_usage,
    },
    ExtractionRule {
        name: "target_market",
        triggers: &[
            "target pasar",
            "untuk siapa",
            "siapa yang",
            "demografi",
            "segmen",
            "usia",
            "umur",
        ],
        extract: extract_target_market,
    },
    ExtractionRule {
        name: "ingredients",
        triggers: &["kandungan", "ingredient", "komposisi", "bahan aktif", "formula"],
        extract: extract_ingredients,
    },
    ExtractionRule {
        name: "benefits",
        triggers: &[
            "keunggulan",
            "benefit",
            "manfaat",
            "kegunaan",
            "fungsi",
            "keuntungan",
            "fitur",
        ],
        extract: extract_benefits,
    },
    ExtractionRule {
        name: "skin_type",
        triggers: &["skin type", "jenis kulit", "untuk kulit", "aman untuk", "cocok untuk"],
        extract: extract_skin_type,
    },
    ExtractionRule {
        name: "duration",
        triggers: &["tahan lama", "durasi", "berapa lama", "seberapa lama", "jam", "hingga"],
        extract: extract_duration,
    },
    ExtractionRule {
        name: "coverage",
        triggers: &["coverage", "hasil", "tekstur", "finish", "aplikasi"],
        extract: extract_coverage,
    },
    ExtractionRule {
        name: "recommendation",
        triggers: &[
            "rekomendasi",
            "rekomendasikan",
            "produk yang",
            "yang bisa",
            "yang dapat",
            "untuk",
            "memiliki",
            "ada produk",
        ],
        extract: extract_recommendation,
    },
];

/// Runs the rule table against a question. Rules are evaluated in
/// declaration order; the first extracted value is returned.
pub fn extract_direct_answer(question: &str, matches: &[SearchMatch]) -> Option<String> {
    let q_lower = question.to_lowercase();
    for rule in &EXTRACTION_RULES {
        if rule.triggers.iter().any(|t| q_lower.contains(t)) {
            if let Some(answer) = (rule.extract)(&q_lower, matches) {
                tracing::debug!(rule = rule.name, "direct answer extracted");
                return Some(answer);
            }
        }
    }
    None
}

fn volume_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+[.,]?\d*)\s*ml").unwrap())
}

fn extract_volume(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        if let Some(caps) = volume_re().captures(&m.metadata.chunk_text) {
            let volume = caps[1].replace(',', ".");
            return Some(format!("{} memiliki volume {} ml.", m.metadata.product, volume));
        }
    }
    None
}

fn weight_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+[.,]?\d*)\s*(gr|g|gram)\b").unwrap())
}

fn extract_weight(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        if let Some(caps) = weight_re().captures(&m.metadata.chunk_text) {
            let weight = caps[1].replace(',', ".");
            let full = caps[0].to_lowercase();
            let unit = if full.contains("gram") {
                "gram"
            } else if full.contains("gr") {
                "gr"
            } else {
                "g"
            };
            return Some(format!(
                "{} memiliki berat {} {}.",
                m.metadata.product, weight, unit
            ));
        }
    }
    None
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Rp\.?\s*[\d.,]+").unwrap())
}

fn extract_price(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        if let Some(found) = price_re().find(&m.metadata.chunk_text) {
            return Some(format!(
                "Harga {} adalah {}.",
                m.metadata.product,
                found.as_str()
            ));
        }
    }
    None
}

fn numbered_step_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\s+").unwrap())
}

/// Inserts line breaks before numbered steps and after sentence ends so
/// chunk text reads as a list instead of one run-on paragraph.
fn break_into_lines(text: &str) -> String {
    static STEP: OnceLock<Regex> = OnceLock::new();
    static SENTENCE: OnceLock<Regex> = OnceLock::new();
    let step = STEP.get_or_init(|| Regex::new(r"(\d+\.\s+)").unwrap());
    let sentence = SENTENCE.get_or_init(|| Regex::new(r"([.!?])\s*([A-Z])").unwrap());

    let text = step.replace_all(text, "\n${1}");
    let text = sentence.replace_all(&text, "${1}\n${2}");
    text.trim().to_string()
}

fn extract_usage(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        let text = &m.metadata.chunk_text;
        let text_lower = text.to_lowercase();
        if m.metadata.section.to_lowercase().contains("cara pakai")
            || text_lower.contains("cara pakai")
            || text_lower.contains("cara menggunakan")
            || numbered_step_re().is_match(text)
            || text_lower.contains("aplikasikan")
        {
            return Some(format!(
                "**Cara Pakai {}:**\n{}",
                m.metadata.product,
                break_into_lines(text)
            ));
        }
    }
    None
}

fn extract_target_market(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    const MARKERS: [&str; 4] = ["wanita aktif", "usia 25", "target utama", "life progressor"];
    for m in matches {
        let text_lower = m.metadata.chunk_text.to_lowercase();
        if MARKERS.iter().any(|w| text_lower.contains(w)) {
            return Some(format!(
                "Target pasar {}: {}",
                m.metadata.product, m.metadata.chunk_text
            ));
        }
    }
    None
}

fn ingredient_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Aqua,|Talc,|Caprylic").unwrap())
}

fn extract_ingredients(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        let text = &m.metadata.chunk_text;
        let text_lower = text.to_lowercase();
        let section_lower = m.metadata.section.to_lowercase();
        if section_lower.contains("kandungan")
            || section_lower.contains("ingredient")
            || text_lower.contains("gold-peptide crystals")
            || text_lower.contains("youthglow active")
            || ingredient_list_re().is_match(text)
        {
            static COMMA: OnceLock<Regex> = OnceLock::new();
            let comma = COMMA.get_or_init(|| Regex::new(r"([a-z])\s*,\s*([A-Z])").unwrap());
            let formatted = break_into_lines(text);
            let formatted = comma.replace_all(&formatted, "${1},\n${2}");
            return Some(format!(
                "**Kandungan {}:**\n{}",
                m.metadata.product,
                formatted.trim()
            ));
        }
    }
    None
}

fn extract_benefits(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        let text = &m.metadata.chunk_text;
        let text_lower = text.to_lowercase();
        let section_lower = m.metadata.section.to_lowercase();
        if section_lower.contains("keunggulan")
            || section_lower.contains("benefit")
            || section_lower.contains("manfaat")
            || numbered_step_re().is_match(text)
            || text_lower.contains("membantu")
            || text_lower.contains("memberikan")
        {
            return Some(format!(
                "**Keunggulan {}:**\n{}",
                m.metadata.product,
                break_into_lines(text)
            ));
        }
    }
    None
}

fn extract_skin_type(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    const MARKERS: [&str; 7] = [
        "all skin type",
        "semua jenis kulit",
        "kecuali acne",
        "kulit sensitif",
        "kulit normal",
        "kulit berminyak",
        "kulit kering",
    ];
    for m in matches {
        let text_lower = m.metadata.chunk_text.to_lowercase();
        if MARKERS.iter().any(|w| text_lower.contains(w)) {
            return Some(format!(
                "{} cocok untuk {}",
                m.metadata.product, m.metadata.chunk_text
            ));
        }
    }
    None
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\d+\s*jam|seharian|all day|hingga\s*\d+\s*jam").unwrap())
}

fn extract_duration(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    for m in matches {
        if let Some(found) = duration_re().find(&m.metadata.chunk_text) {
            return Some(format!(
                "{} tahan lama {}",
                m.metadata.product,
                found.as_str()
            ));
        }
    }
    None
}

fn extract_coverage(_q: &str, matches: &[SearchMatch]) -> Option<String> {
    const MARKERS: [&str; 6] = [
        "medium to full",
        "soft focus",
        "matte",
        "glossy",
        "natural",
        "flawless",
    ];
    for m in matches {
        let text_lower = m.metadata.chunk_text.to_lowercase();
        if MARKERS.iter().any(|w| text_lower.contains(w)) {
            return Some(format!(
                "Hasil aplikasi {}: {}",
                m.metadata.product, m.metadata.chunk_text
            ));
        }
    }
    None
}

/// Question phrases mapping to the chunk vocabulary they imply. Each
/// group that fires contributes its keywords to the criteria set.
struct CriterionGroup {
    question_hints: &'static [&'static str],
    keywords: &'static [&'static str],
}

const CRITERION_GROUPS: [CriterionGroup; 9] = [
    CriterionGroup {
        question_hints: &["hidrasi", "lembab"],
        keywords: &["hidrasi", "lembab", "moisture", "hydration"],
    },
    CriterionGroup {
        question_hints: &["2x", "dua kali"],
        keywords: &["2x", "dua kali", "lebih lembab"],
    },
    CriterionGroup {
        question_hints: &["8 jam", "8h"],
        keywords: &["8 jam", "8h", "8 hour"],
    },
    CriterionGroup {
        question_hints: &["mempertahankan"],
        keywords: &["mempertahankan", "pertahankan", "lasting"],
    },
    CriterionGroup {
        question_hints: &["kerutan", "garis halus"],
        keywords: &["kerutan", "garis halus", "wrinkle", "fine line"],
    },
    CriterionGroup {
        question_hints: &["menyamarkan", "menutupi"],
        keywords: &["menyamarkan", "menutupi", "conceal", "cover"],
    },
    CriterionGroup {
        question_hints: &["mencerahkan", "brightening"],
        keywords: &["mencerahkan", "brightening", "cerah"],
    },
    CriterionGroup {
        question_hints: &["anti aging", "anti-aging"],
        keywords: &["anti aging", "anti-aging", "antiaging"],
    },
    CriterionGroup {
        question_hints: &["spf", "sun protection"],
        keywords: &["spf", "sun protection", "uv protection"],
    },
];

/// Scoring-based recommendation: every distinct product is scored by
/// how many criterion keywords appear in its chunks; the top score
/// wins, ties are listed together. No score above zero falls through
/// to the language model.
fn extract_recommendation(q_lower: &str, matches: &[SearchMatch]) -> Option<String> {
    let mut criteria: Vec<&str> = Vec::new();
    for group in &CRITERION_GROUPS {
        if group.question_hints.iter().any(|h| q_lower.contains(h)) {
            criteria.extend_from_slice(group.keywords);
        }
    }
    if criteria.is_empty() {
        return None;
    }

    // Insertion-ordered so tie output follows match ranking.
    let mut scores: Vec<(String, usize)> = Vec::new();
    for m in matches {
        let text_lower = m.metadata.chunk_text.to_lowercase();
        let hits = criteria.iter().filter(|k| text_lower.contains(*k)).count();
        if hits == 0 {
            continue;
        }
        match scores.iter_mut().find(|(p, _)| *p == m.metadata.product) {
            Some((_, score)) => *score += hits,
            None => scores.push((m.metadata.product.clone(), hits)),
        }
    }

    let top_score = scores.iter().map(|(_, s)| *s).max()?;
    let top_products: Vec<&str> = scores
        .iter()
        .filter(|(_, s)| *s == top_score)
        .map(|(p, _)| p.as_str())
        .collect();

    if top_products.len() == 1 {
        Some(format!(
            "Berdasarkan kriteria yang Anda sebutkan, saya merekomendasikan **{}** karena memenuhi {} kriteria yang Anda cari.",
            top_products[0], top_score
        ))
    } else {
        Some(format!(
            "Berdasarkan kriteria yang Anda sebutkan, saya merekomendasikan **{}** karena sama-sama memenuhi {} kriteria yang Anda cari.",
            top_products.join("**, **"),
            top_score
        ))
    }
}
