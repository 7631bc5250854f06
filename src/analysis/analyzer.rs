//! Text analyzers: a tokenizer followed by an ordered filter chain.

use std::fmt;
use std::sync::Arc;

use crate::analysis::token::Token;
use crate::analysis::token_filter::TokenFilter;
use crate::analysis::tokenizer::Tokenizer;

/// A complete analysis pipeline. Cheap to clone.
#[derive(Clone)]
pub struct TextAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn TokenFilter>>,
}

impl fmt::Debug for TextAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextAnalyzer")
            .field("tokenizer", &self.tokenizer)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl TextAnalyzer {
    /// An analyzer with no filters.
    pub fn new<T: Tokenizer + 'static>(tokenizer: T) -> TextAnalyzer {
        TextAnalyzer {
            tokenizer: Arc::new(tokenizer),
            filters: Vec::new(),
        }
    }

    /// Start building an analyzer from a tokenizer.
    pub fn builder<T: Tokenizer + 'static>(tokenizer: T) -> TextAnalyzerBuilder {
        TextAnalyzerBuilder {
            analyzer: TextAnalyzer::new(tokenizer),
        }
    }

    /// Run the pipeline over `text`.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);
        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }
        tokens
    }
}

/// Builder for [`TextAnalyzer`]; filters apply in registration order.
pub struct TextAnalyzerBuilder {
    analyzer: TextAnalyzer,
}

impl TextAnalyzerBuilder {
    /// Append a filter to the chain.
    pub fn filter<F: TokenFilter + 'static>(mut self, filter: F) -> Self {
        self.analyzer.filters.push(Arc::new(filter));
        self
    }

    /// Finish the pipeline.
    pub fn build(self) -> TextAnalyzer {
        self.analyzer
    }
}
