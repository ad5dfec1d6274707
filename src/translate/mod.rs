mod align;
mod placeholder;

pub use align::{DICTIONARY_CONFIDENCE, GENERATED_CONFIDENCE, align_words};
pub use placeholder::{ARABIC_ALPHABET, PlaceholderError, PlaceholderSource, RandomFiller};

use std::sync::Arc;
use std::time::Duration;

use crate::dictionary::{Dictionary, normalize_token};
use crate::error::TranslationError;
use crate::model::{PageExtraction, TranslatedItem, TranslatedPage};
use crate::progress::Progress;

/// Word-by-word translator backed by a shared dictionary. Tokens the
/// dictionary misses go to the [`PlaceholderSource`].
pub struct TranslationEngine<P: PlaceholderSource = RandomFiller> {
    dictionary: Arc<Dictionary>,
    placeholder: P,
    page_delay: Duration,
}

impl TranslationEngine<RandomFiller> {
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self::with_placeholder(dictionary, RandomFiller::default())
    }
}

impl<P: PlaceholderSource> TranslationEngine<P> {
    pub fn with_placeholder(dictionary: Arc<Dictionary>, placeholder: P) -> Self {
        Self {
            dictionary,
            placeholder,
            page_delay: Duration::ZERO,
        }
    }

    /// Pause inserted after each page, for pacing progress output.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub async fn translate(
        &mut self,
        pages: &[PageExtraction],
        progress: &Progress,
    ) -> Result<Vec<TranslatedPage>, TranslationError> {
        let total = pages.len();
        let mut translated = Vec::with_capacity(total);
        for (idx, page) in pages.iter().enumerate() {
            progress.report(
                idx as f32 / total as f32 * 100.0,
                format!("Translating page {} of {}...", idx + 1, total),
            );
            translated.push(self.translate_page(page)?);
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
        progress.report(100.0, "Translation complete!");
        Ok(translated)
    }

    pub fn translate_page(
        &mut self,
        page: &PageExtraction,
    ) -> Result<TranslatedPage, TranslationError> {
        let mut translated_items = Vec::with_capacity(page.items.len());
        let mut word_mappings = Vec::new();

        for item in &page.items {
            let source_text = item.text();
            let (text, degraded) = match self.translate_text(source_text) {
                Ok(text) => (text, false),
                Err(PlaceholderError::Skip(reason)) => {
                    tracing::warn!(
                        page = page.page_number,
                        text = source_text,
                        reason = %reason,
                        "keeping source text for item"
                    );
                    (source_text.to_string(), true)
                }
                Err(PlaceholderError::Abort(reason)) => {
                    return Err(TranslationError {
                        page: page.page_number,
                        reason,
                    });
                }
            };
            word_mappings.extend(align_words(
                &self.dictionary,
                source_text,
                &text,
                word_mappings.len(),
            ));
            translated_items.push(TranslatedItem {
                source: item.clone(),
                text,
                degraded,
            });
        }

        let translated_text = translated_items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(
            page = page.page_number,
            items = translated_items.len(),
            mappings = word_mappings.len(),
            "page translated"
        );
        Ok(TranslatedPage {
            page_number: page.page_number,
            original_text: page.raw_text.clone(),
            translated_text,
            translated_items,
            word_mappings,
        })
    }

    /// Phrase table first, then token by token.
    pub fn translate_text(&mut self, text: &str) -> Result<String, PlaceholderError> {
        let normalized = text.trim().to_lowercase();
        if let Some((phrase, translation)) = self
            .dictionary
            .phrases()
            .iter()
            .find(|(phrase, _)| normalized.contains(phrase.as_str()))
        {
            return Ok(replace_ignore_case(text, phrase, translation));
        }

        let mut words = Vec::new();
        for token in text.split_whitespace() {
            match self.dictionary.lookup(&normalize_token(token)) {
                Some(translation) => words.push(translation.to_string()),
                None => words.push(self.placeholder.placeholder(token)?),
            }
        }
        Ok(words.join(" "))
    }
}

fn replace_ignore_case(text: &str, needle: &str, replacement: &str) -> String {
    let target = needle.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    if target.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if let Some(len) = match_len_ignore_case(rest, &target) {
            out.push_str(replacement);
            rest = &rest[len..];
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Byte length of the prefix of `haystack` that lowercases to `target`.
fn match_len_ignore_case(haystack: &str, target: &[char]) -> Option<usize> {
    let mut matched = 0;
    for (offset, ch) in haystack.char_indices() {
        for lower in ch.to_lowercase() {
            if target.get(matched) != Some(&lower) {
                return None;
            }
            matched += 1;
        }
        if matched == target.len() {
            return Some(offset + ch.len_utf8());
        }
    }
    None
}
