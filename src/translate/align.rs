use crate::dictionary::{Dictionary, normalize_token};
use crate::model::WordMapping;

pub const DICTIONARY_CONFIDENCE: f64 = 1.0;
pub const GENERATED_CONFIDENCE: f64 = 0.7;

/// Pairs the whitespace tokens of `original` and `translated` by index. The
/// shorter side is padded with empty strings; `first_position` is the page
/// position of the first pair.
pub fn align_words(
    dictionary: &Dictionary,
    original: &str,
    translated: &str,
    first_position: usize,
) -> Vec<WordMapping> {
    let source = original.split_whitespace().collect::<Vec<_>>();
    let target = translated.split_whitespace().collect::<Vec<_>>();
    let count = source.len().max(target.len());

    (0..count)
        .map(|idx| {
            let original = source.get(idx).copied().unwrap_or_default();
            let translated = target.get(idx).copied().unwrap_or_default();
            WordMapping {
                original: original.to_string(),
                translated: translated.to_string(),
                confidence: confidence(dictionary, original),
                position: first_position + idx,
            }
        })
        .collect()
}

fn confidence(dictionary: &Dictionary, original: &str) -> f64 {
    if dictionary.contains(&normalize_token(original)) {
        DICTIONARY_CONFIDENCE
    } else {
        GENERATED_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pairs(mappings: &[WordMapping]) -> Vec<(&str, &str)> {
        mappings
            .iter()
            .map(|m| (m.original.as_str(), m.translated.as_str()))
            .collect()
    }

    #[test]
    fn longer_source_is_padded_on_the_target_side() {
        let dictionary = Dictionary::new(HashMap::new());
        let mappings = align_words(&dictionary, "a b c", "x y", 0);
        assert_eq!(pairs(&mappings), vec![("a", "x"), ("b", "y"), ("c", "")]);
        assert!(mappings.iter().all(|m| m.confidence == GENERATED_CONFIDENCE));
    }

    #[test]
    fn longer_target_is_padded_on_the_source_side() {
        let dictionary = Dictionary::new(HashMap::new());
        let mappings = align_words(&dictionary, "blood", "ضغط الدم", 4);
        assert_eq!(pairs(&mappings), vec![("blood", "ضغط"), ("", "الدم")]);
        assert_eq!(mappings[0].position, 4);
        assert_eq!(mappings[1].position, 5);
    }

    #[test]
    fn dictionary_hits_ignore_case_and_punctuation() {
        let words = HashMap::from([("hello".to_string(), "مرحبا".to_string())]);
        let dictionary = Dictionary::new(words);
        let mappings = align_words(&dictionary, "Hello, there", "مرحبا ثقب", 0);
        assert_eq!(mappings[0].confidence, DICTIONARY_CONFIDENCE);
        assert_eq!(mappings[1].confidence, GENERATED_CONFIDENCE);
    }
}
