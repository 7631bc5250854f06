//! Tokenization strategies.
//!
//! A tokenizer consumes a text string and produces a finite, restartable
//! sequence of tokens. Tokenizers that take configuration validate it at
//! construction time; `tokenize` itself never fails.

use std::fmt;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;
use crate::error::{FathomError, Result};

/// Default byte-length cap applied by [`SimpleTokenizer`].
pub const DEFAULT_TOKEN_LENGTH_LIMIT: usize = 40;

/// Breaks text into tokens.
pub trait Tokenizer: Send + Sync + fmt::Debug {
    /// Tokenize `text`. Calling again restarts the sequence from scratch.
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Splits on Unicode whitespace; tokens keep their original case.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        let mut start = None;

        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(from) = start.take() {
                    tokens.push(Token::new(&text[from..idx], from, idx, position));
                    position += 1;
                }
            } else if start.is_none() {
                start = Some(idx);
            }
        }
        if let Some(from) = start {
            tokens.push(Token::new(&text[from..], from, text.len(), position));
        }
        tokens
    }
}

/// Splits on alphanumeric runs using Unicode word boundaries and drops
/// tokens longer than the configured byte limit.
#[derive(Debug, Clone)]
pub struct SimpleTokenizer {
    token_length_limit: usize,
}

impl Default for SimpleTokenizer {
    fn default() -> Self {
        SimpleTokenizer {
            token_length_limit: DEFAULT_TOKEN_LENGTH_LIMIT,
        }
    }
}

impl SimpleTokenizer {
    /// Create a simple tokenizer with the default 40-byte length cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the token byte-length cap.
    pub fn with_length_limit(limit: usize) -> Self {
        SimpleTokenizer {
            token_length_limit: limit,
        }
    }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.split_word_bound_indices() {
            if !word.chars().any(|c| c.is_alphanumeric()) {
                continue;
            }
            if word.len() > self.token_length_limit {
                // Oversized runs are dropped, not truncated; the position
                // gap is preserved for phrase matching.
                position += 1;
                continue;
            }
            tokens.push(Token::new(word, offset, offset + word.len(), position));
            position += 1;
        }
        tokens
    }
}

/// Pass-through: the whole input becomes a single token.
#[derive(Debug, Clone, Default)]
pub struct RawTokenizer;

impl Tokenizer for RawTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::new(text, 0, text.len(), 0)]
    }
}

/// Emits every match of a regex pattern as a token.
///
/// The pattern is compiled at construction time; an invalid pattern is a
/// configuration error there, never at tokenize time.
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    pattern: Regex,
}

impl RegexTokenizer {
    /// Compile `pattern` into a tokenizer.
    pub fn new(pattern: &str) -> Result<RegexTokenizer> {
        let pattern = Regex::new(pattern)
            .map_err(|e| FathomError::config(format!("Invalid tokenizer pattern: {e}")))?;
        Ok(RegexTokenizer { pattern })
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        self.pattern
            .find_iter(text)
            .enumerate()
            .map(|(position, m)| Token::new(m.as_str(), m.start(), m.end(), position as u32))
            .collect()
    }
}

/// Emits all n-grams between `min_gram` and `max_gram` code points.
#[derive(Debug, Clone)]
pub struct NgramTokenizer {
    min_gram: usize,
    max_gram: usize,
    /// When true, only grams anchored at the start of the input are emitted.
    prefix_only: bool,
}

impl NgramTokenizer {
    /// Create an n-gram tokenizer. `1 <= min_gram <= max_gram` is required.
    pub fn new(min_gram: usize, max_gram: usize) -> Result<NgramTokenizer> {
        if min_gram == 0 {
            return Err(FathomError::config("min_gram must be at least 1"));
        }
        if min_gram > max_gram {
            return Err(FathomError::config("min_gram may not exceed max_gram"));
        }
        Ok(NgramTokenizer {
            min_gram,
            max_gram,
            prefix_only: false,
        })
    }

    /// Restrict emission to grams anchored at the start of the input.
    pub fn prefix_only(mut self) -> Self {
        self.prefix_only = true;
        self
    }
}

impl Tokenizer for NgramTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        // Code-point boundaries, including the end of the string.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        boundaries.push(text.len());
        let num_chars = boundaries.len() - 1;

        let mut tokens = Vec::new();
        let mut position = 0u32;
        for start in 0..num_chars {
            if self.prefix_only && start > 0 {
                break;
            }
            for gram in self.min_gram..=self.max_gram {
                if start + gram > num_chars {
                    break;
                }
                let from = boundaries[start];
                let to = boundaries[start + gram];
                tokens.push(Token::new(&text[from..to], from, to, position));
                position += 1;
            }
        }
        tokens
    }
}
