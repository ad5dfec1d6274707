use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

pub const ARABIC_ALPHABET: &str = "ابتثجحخدذرزسشصضطظعغفقكلمنهوي";
const MAX_PLACEHOLDER_CHARS: usize = 6;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    /// The item keeps its source text and is marked degraded.
    #[error("no translation for {0:?}")]
    Skip(String),

    /// The whole page fails.
    #[error("translation backend failed: {0}")]
    Abort(String),
}

/// Produces the target string for a token the dictionary does not know.
pub trait PlaceholderSource {
    fn placeholder(&mut self, token: &str) -> Result<String, PlaceholderError>;
}

/// Fills unknown tokens with random letters from the target alphabet.
/// Numbers and lone punctuation pass through unchanged.
#[derive(Debug, Clone)]
pub struct RandomFiller {
    alphabet: Vec<char>,
    rng: StdRng,
}

impl RandomFiller {
    pub fn new(alphabet: &str) -> Self {
        Self::with_rng(alphabet, StdRng::from_entropy())
    }

    pub fn seeded(alphabet: &str, seed: u64) -> Self {
        Self::with_rng(alphabet, StdRng::seed_from_u64(seed))
    }

    fn with_rng(alphabet: &str, rng: StdRng) -> Self {
        let mut alphabet = alphabet
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<Vec<_>>();
        if alphabet.is_empty() {
            tracing::warn!("empty placeholder alphabet, using arabic letters");
            alphabet = ARABIC_ALPHABET.chars().collect();
        }
        Self { alphabet, rng }
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }
}

impl Default for RandomFiller {
    fn default() -> Self {
        Self::new(ARABIC_ALPHABET)
    }
}

impl PlaceholderSource for RandomFiller {
    fn placeholder(&mut self, token: &str) -> Result<String, PlaceholderError> {
        if is_passthrough(token) {
            return Ok(token.to_string());
        }
        let len = token.chars().count().min(MAX_PLACEHOLDER_CHARS);
        Ok((0..len)
            .map(|_| self.alphabet[self.rng.gen_range(0..self.alphabet.len())])
            .collect())
    }
}

fn is_passthrough(token: &str) -> bool {
    if !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit()) {
        return true;
    }
    let mut chars = token.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(ch), None) if !(ch.is_alphanumeric() || ch == '_')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_capped_at_six_alphabet_letters() {
        let mut filler = RandomFiller::seeded(ARABIC_ALPHABET, 7);
        let short = filler.placeholder("term").expect("placeholder");
        let long = filler.placeholder("hospitalization").expect("placeholder");
        assert_eq!(short.chars().count(), 4);
        assert_eq!(long.chars().count(), 6);
        assert!(long.chars().all(|ch| ARABIC_ALPHABET.contains(ch)));
    }

    #[test]
    fn numbers_and_lone_punctuation_pass_through() {
        let mut filler = RandomFiller::seeded(ARABIC_ALPHABET, 1);
        assert_eq!(filler.placeholder("2024").expect("digits"), "2024");
        assert_eq!(filler.placeholder(",").expect("comma"), ",");
        assert_ne!(filler.placeholder("x1").expect("word"), "x1");
    }

    #[test]
    fn same_seed_gives_same_output() {
        let mut first = RandomFiller::seeded("abc", 42);
        let mut second = RandomFiller::seeded("abc", 42);
        assert_eq!(
            first.placeholder("unknown").expect("first"),
            second.placeholder("unknown").expect("second")
        );
    }

    #[test]
    fn blank_alphabet_falls_back_to_arabic() {
        let filler = RandomFiller::seeded("  ", 0);
        assert_eq!(filler.alphabet().len(), ARABIC_ALPHABET.chars().count());
    }
}
