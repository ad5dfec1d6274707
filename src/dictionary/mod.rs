pub mod tei;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::DictionaryLoadError;

const FALLBACK_ENTRIES: &[(&str, &str)] = &[
    ("hello", "مرحبا"),
    ("world", "عالم"),
    ("error", "خطأ"),
    ("loading", "تحميل"),
    ("dictionary", "قاموس"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionarySource {
    File,
    Inline,
    Fallback,
}

/// Source-word to target-string lookup, read-only once built.
///
/// Keys are stored in their normalized form (see [`normalize_token`]) so a
/// lookup with a normalized token is a plain hash probe. Phrases are kept
/// longest first, which is the order the translation engine tries them in.
#[derive(Debug, Clone)]
pub struct Dictionary {
    words: HashMap<String, String>,
    phrases: Vec<(String, String)>,
    source: DictionarySource,
}

impl Dictionary {
    pub fn new(words: HashMap<String, String>) -> Self {
        Self::build(words, DictionarySource::Inline)
    }

    pub fn fallback() -> Self {
        let words = FALLBACK_ENTRIES
            .iter()
            .map(|(word, translation)| (word.to_string(), translation.to_string()))
            .collect();
        Self::build(words, DictionarySource::Fallback)
    }

    fn build(words: HashMap<String, String>, source: DictionarySource) -> Self {
        let words = words
            .into_iter()
            .filter_map(|(word, translation)| {
                let key = normalize_token(&word);
                if key.is_empty() {
                    None
                } else {
                    Some((key, translation))
                }
            })
            .collect();
        Self {
            words,
            phrases: Vec::new(),
            source,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let words = parse_string_map(json)?;
        Ok(Self::build(words, DictionarySource::File))
    }

    pub fn load(path: &Path) -> Result<Self, DictionaryLoadError> {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|content| Self::from_json(&content))
            .map_err(|source| DictionaryLoadError {
                path: path.display().to_string(),
                source,
            })
    }

    /// Loads `path` when given, otherwise (or on any failure) the built-in
    /// fallback set. Never fails.
    pub fn load_or_fallback(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("no dictionary configured, using built-in fallback");
            return Self::fallback();
        };
        match Self::load(path) {
            Ok(dictionary) => {
                tracing::info!(
                    entries = dictionary.len(),
                    path = %path.display(),
                    "dictionary loaded"
                );
                dictionary
            }
            Err(err) => {
                tracing::warn!(error = %err, "falling back to built-in dictionary");
                Self::fallback()
            }
        }
    }

    pub fn with_phrases(mut self, phrases: HashMap<String, String>) -> Self {
        let mut phrases = phrases
            .into_iter()
            .filter_map(|(phrase, translation)| {
                let key = phrase.trim().to_lowercase();
                if key.is_empty() {
                    None
                } else {
                    Some((key, translation))
                }
            })
            .collect::<Vec<_>>();
        phrases.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        self.phrases = phrases;
        self
    }

    pub fn lookup(&self, normalized: &str) -> Option<&str> {
        self.words.get(normalized).map(String::as_str)
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.words.contains_key(normalized)
    }

    pub fn phrases(&self) -> &[(String, String)] {
        &self.phrases
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn source(&self) -> DictionarySource {
        self.source
    }
}

pub fn load_phrases(path: &Path) -> Result<HashMap<String, String>> {
    load_word_map(path).with_context(|| "failed to load phrase table")
}

/// Reads a `{key: translation}` JSON object without normalizing keys.
pub fn load_word_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_string_map(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Lowercases and drops everything that is not a word character.
pub fn normalize_token(word: &str) -> String {
    word.chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Overlay entries win over base entries with the same key.
pub fn combine(
    base: HashMap<String, String>,
    overlay: HashMap<String, String>,
) -> BTreeMap<String, String> {
    let mut combined = base.into_iter().collect::<BTreeMap<_, _>>();
    combined.extend(overlay);
    combined
}

fn parse_string_map(json: &str) -> Result<HashMap<String, String>> {
    let value: Value = serde_json::from_str(json).with_context(|| "invalid json")?;
    let Value::Object(map) = value else {
        return Err(anyhow!("expected a json object of word -> translation"));
    };
    let mut words = HashMap::with_capacity(map.len());
    let mut skipped = 0usize;
    for (key, value) in map {
        match value {
            Value::String(translation) if !translation.trim().is_empty() => {
                words.insert(key, translation);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "ignored non-string dictionary values");
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalize_strips_punctuation_and_lowercases() {
        assert_eq!(normalize_token("Hello,"), "hello");
        assert_eq!(normalize_token("(Patient's)"), "patients");
        assert_eq!(normalize_token("snake_case"), "snake_case");
        assert_eq!(normalize_token("--"), "");
    }

    #[test]
    fn from_json_normalizes_keys_and_skips_non_strings() {
        let dictionary =
            Dictionary::from_json(r#"{"Hello": "X", "world!": "Y", "count": 3, "empty": ""}"#)
                .expect("parse");
        assert_eq!(dictionary.lookup("hello"), Some("X"));
        assert_eq!(dictionary.lookup("world"), Some("Y"));
        assert!(!dictionary.contains("count"));
        assert!(!dictionary.contains("empty"));
        assert_eq!(dictionary.source(), DictionarySource::File);
    }

    #[test]
    fn missing_file_falls_back_to_builtin_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.json");
        assert!(Dictionary::load(&missing).is_err());

        let dictionary = Dictionary::load_or_fallback(Some(&missing));
        assert_eq!(dictionary.source(), DictionarySource::Fallback);
        assert_eq!(dictionary.len(), FALLBACK_ENTRIES.len());
        assert!(dictionary.contains("hello"));
    }

    #[test]
    fn malformed_file_falls_back_to_builtin_set() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"[1, 2, 3]").expect("write");
        let dictionary = Dictionary::load_or_fallback(Some(file.path()));
        assert_eq!(dictionary.source(), DictionarySource::Fallback);
    }

    #[test]
    fn phrases_are_ordered_longest_first() {
        let phrases = HashMap::from([
            ("blood".to_string(), "A".to_string()),
            ("High Blood Pressure".to_string(), "B".to_string()),
            ("blood pressure".to_string(), "C".to_string()),
        ]);
        let dictionary = Dictionary::new(HashMap::new()).with_phrases(phrases);
        let keys = dictionary
            .phrases()
            .iter()
            .map(|(phrase, _)| phrase.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["high blood pressure", "blood pressure", "blood"]);
    }

    #[test]
    fn combine_prefers_overlay_entries() {
        let base = HashMap::from([
            ("heart".to_string(), "base".to_string()),
            ("lung".to_string(), "base".to_string()),
        ]);
        let overlay = HashMap::from([("heart".to_string(), "overlay".to_string())]);
        let combined = combine(base, overlay);
        assert_eq!(combined["heart"], "overlay");
        assert_eq!(combined["lung"], "base");
    }
}
