//! Token filters.
//!
//! A filter consumes a token sequence and produces a transformed sequence.
//! Filters compose in registration order on a [`crate::analysis::TextAnalyzer`].
//! Filters that remove tokens leave position gaps rather than renumbering,
//! so phrase matching still sees the original spacing.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;

use crate::analysis::token::Token;

/// Transforms a token sequence.
pub trait TokenFilter: Send + Sync + fmt::Debug {
    /// Apply the filter.
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token>;
}

/// Lowercases token text.
#[derive(Debug, Clone, Default)]
pub struct LowerCaser;

impl TokenFilter for LowerCaser {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in &mut tokens {
            if token.text.chars().any(|c| c.is_uppercase()) {
                token.text = token.text.to_lowercase();
            }
        }
        tokens
    }
}

lazy_static! {
    static ref ENGLISH_STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
        "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
        "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect();
}

/// Removes stopwords.
#[derive(Clone)]
pub struct StopWordFilter {
    words: HashSet<String>,
}

impl fmt::Debug for StopWordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopWordFilter")
            .field("words", &self.words.len())
            .finish()
    }
}

impl StopWordFilter {
    /// The default English stopword set.
    pub fn english() -> StopWordFilter {
        StopWordFilter {
            words: ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// A custom stopword set.
    pub fn new<I, S>(words: I) -> StopWordFilter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWordFilter {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .filter(|token| !self.words.contains(&token.text))
            .collect()
    }
}

/// Removes tokens longer than a byte-length limit.
#[derive(Debug, Clone)]
pub struct RemoveLongFilter {
    limit: usize,
}

impl RemoveLongFilter {
    /// Remove tokens whose text exceeds `limit` bytes.
    pub fn limit(limit: usize) -> RemoveLongFilter {
        RemoveLongFilter { limit }
    }
}

impl TokenFilter for RemoveLongFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .filter(|token| token.text.len() <= self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::{SimpleTokenizer, Tokenizer};

    #[test]
    fn test_lowercaser() {
        let tokens = LowerCaser.filter(SimpleTokenizer::new().tokenize("Hello WORLD"));
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "world"]);
    }

    #[test]
    fn test_stopword_filter_keeps_position_gaps() {
        let tokens = SimpleTokenizer::new().tokenize("the old man");
        let filtered = StopWordFilter::english().filter(LowerCaser.filter(tokens));
        let texts: Vec<_> = filtered.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["old", "man"]);
        // "the" occupied position 0; the survivors keep their slots.
        assert_eq!(filtered[0].position, 1);
        assert_eq!(filtered[1].position, 2);
    }

    #[test]
    fn test_remove_long_filter() {
        let tokens = SimpleTokenizer::with_length_limit(1000).tokenize("ok enormousword");
        let filtered = RemoveLongFilter::limit(8).filter(tokens);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].text, "ok");
    }
}
