//! Text analysis for fathom.
//!
//! Converts raw text into normalized token sequences before indexing and
//! query evaluation:
//!
//! ```text
//! Text → Tokenizer → Token Stream → Token Filters → Analyzed Tokens
//! ```
//!
//! - [`tokenizer`]: tokenization strategies (whitespace, simple, raw,
//!   regex-pattern, n-gram)
//! - [`token_filter`]: token transformations (lowercasing, stopword removal,
//!   long-token removal)
//! - [`analyzer`]: tokenizer + filter chains
//! - [`registry`]: the per-index analyzer registry
//! - [`token`]: token representation

pub mod analyzer;
pub mod registry;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::TextAnalyzer;
pub use registry::AnalyzerRegistry;
pub use token::Token;
pub use token_filter::{LowerCaser, RemoveLongFilter, StopWordFilter, TokenFilter};
pub use tokenizer::{
    NgramTokenizer, RawTokenizer, RegexTokenizer, SimpleTokenizer, Tokenizer, WhitespaceTokenizer,
};
