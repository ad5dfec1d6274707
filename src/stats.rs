use serde::Serialize;

use crate::dictionary::normalize_token;
use crate::model::TranslatedPage;

pub const MEDICAL_TERMS: &[&str] = &[
    "medical",
    "patient",
    "doctor",
    "hospital",
    "treatment",
    "diagnosis",
    "medicine",
    "health",
    "blood",
    "pressure",
    "heart",
    "lung",
    "brain",
    "surgery",
    "emergency",
    "clinic",
    "pharmacy",
    "nurse",
    "pain",
    "fever",
    "infection",
    "vaccine",
    "therapy",
    "examination",
    "prescription",
    "symptom",
    "disease",
    "recovery",
];

pub fn is_medical_term(word: &str) -> bool {
    let normalized = normalize_token(word);
    MEDICAL_TERMS.contains(&normalized.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationStats {
    pub total_pages: usize,
    /// Source text items across all pages.
    pub total_words: usize,
    /// Items that received a translation rather than keeping their source.
    pub translated_words: usize,
    pub medical_terms: usize,
    /// Mean mapping confidence; 0 when there are no mappings.
    pub confidence: f64,
}

pub fn stats(pages: &[TranslatedPage]) -> TranslationStats {
    let total_words = pages.iter().map(|page| page.translated_items.len()).sum();
    let translated_words = pages
        .iter()
        .flat_map(|page| &page.translated_items)
        .filter(|item| !item.degraded)
        .count();

    let mut mappings = 0usize;
    let mut confidence_sum = 0.0f64;
    let mut medical_terms = 0usize;
    for mapping in pages.iter().flat_map(|page| &page.word_mappings) {
        mappings += 1;
        confidence_sum += mapping.confidence;
        if mapping.is_medical() {
            medical_terms += 1;
        }
    }
    let confidence = if mappings == 0 {
        0.0
    } else {
        confidence_sum / mappings as f64
    };

    TranslationStats {
        total_pages: pages.len(),
        total_words,
        translated_words,
        medical_terms,
        confidence,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedMapping {
    pub page: u32,
    pub original: String,
    pub translated: String,
    pub confidence: f64,
    pub is_medical: bool,
}

/// Flattens every page's word mappings, in page then position order.
pub fn export_word_mappings(pages: &[TranslatedPage]) -> Vec<ExportedMapping> {
    pages
        .iter()
        .flat_map(|page| {
            page.word_mappings.iter().map(|mapping| ExportedMapping {
                page: page.page_number,
                original: mapping.original.clone(),
                translated: mapping.translated.clone(),
                confidence: mapping.confidence,
                is_medical: mapping.is_medical(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OcrItem, TextItem, TranslatedItem, WordMapping};

    fn mapping(original: &str, confidence: f64, position: usize) -> WordMapping {
        WordMapping {
            original: original.to_string(),
            translated: "x".to_string(),
            confidence,
            position,
        }
    }

    fn item(text: &str, degraded: bool) -> TranslatedItem {
        TranslatedItem {
            source: TextItem::Ocr(OcrItem {
                text: text.to_string(),
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.9,
            }),
            text: text.to_string(),
            degraded,
        }
    }

    fn sample_pages() -> Vec<TranslatedPage> {
        vec![
            TranslatedPage {
                page_number: 1,
                original_text: "Patient fever".to_string(),
                translated_text: "x x".to_string(),
                translated_items: vec![item("Patient", false), item("fever", true)],
                word_mappings: vec![mapping("Patient", 1.0, 0), mapping("fever", 0.7, 1)],
            },
            TranslatedPage {
                page_number: 2,
                original_text: "today".to_string(),
                translated_text: "x".to_string(),
                translated_items: vec![item("today", false)],
                word_mappings: vec![mapping("today", 0.7, 0)],
            },
        ]
    }

    #[test]
    fn empty_input_has_zero_confidence() {
        let summary = stats(&[]);
        assert_eq!(summary.total_pages, 0);
        assert_eq!(summary.medical_terms, 0);
        assert_eq!(summary.confidence, 0.0);
    }

    #[test]
    fn counts_items_mappings_and_medical_terms() {
        let summary = stats(&sample_pages());
        assert_eq!(summary.total_pages, 2);
        assert_eq!(summary.total_words, 3);
        assert_eq!(summary.translated_words, 2);
        assert_eq!(summary.medical_terms, 2);
        assert!((summary.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn medical_terms_match_after_normalization() {
        assert!(is_medical_term("Blood,"));
        assert!(!is_medical_term("bloody"));
    }

    #[test]
    fn stats_serialize_in_camel_case() {
        let summary = stats(&sample_pages());
        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["translatedWords"], 2);
        assert_eq!(json["medicalTerms"], 2);
    }

    #[test]
    fn export_flattens_pages_in_order() {
        let exported = export_word_mappings(&sample_pages());
        let lines = exported
            .iter()
            .map(|m| {
                format!(
                    "{} {} -> {} ({}%){}",
                    m.page,
                    m.original,
                    m.translated,
                    (m.confidence * 100.0).round(),
                    if m.is_medical { " medical" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!(lines, @r"
        1 Patient -> x (100%) medical
        1 fever -> x (70%) medical
        2 today -> x (70%)
        ");
    }
}
