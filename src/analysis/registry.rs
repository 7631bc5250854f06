//! Per-index analyzer registry.
//!
//! Analyzers are registered on an index by name and looked up when a text
//! field is indexed or a query is parsed. The registry is explicit per-index
//! state rather than a process-global table, so two indexes in one process
//! never interfere.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::analysis::analyzer::TextAnalyzer;
use crate::analysis::token_filter::LowerCaser;
use crate::analysis::tokenizer::{RawTokenizer, SimpleTokenizer, WhitespaceTokenizer};

/// The analyzer name used when a text field does not configure one.
pub const DEFAULT_ANALYZER_NAME: &str = "default";

/// A named registry of [`TextAnalyzer`] pipelines.
pub struct AnalyzerRegistry {
    analyzers: RwLock<AHashMap<String, TextAnalyzer>>,
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.analyzers.read().keys().cloned().collect();
        f.debug_struct("AnalyzerRegistry")
            .field("registered", &names)
            .finish()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(AHashMap::new()),
        };
        registry.register(
            DEFAULT_ANALYZER_NAME,
            TextAnalyzer::builder(SimpleTokenizer::new())
                .filter(LowerCaser)
                .build(),
        );
        registry.register(
            "simple",
            TextAnalyzer::builder(SimpleTokenizer::new())
                .filter(LowerCaser)
                .build(),
        );
        registry.register("whitespace", TextAnalyzer::new(WhitespaceTokenizer));
        registry.register("raw", TextAnalyzer::new(RawTokenizer));
        registry
    }
}

impl AnalyzerRegistry {
    /// A registry preloaded with the built-in analyzers
    /// (`default`, `simple`, `whitespace`, `raw`).
    pub fn new() -> AnalyzerRegistry {
        AnalyzerRegistry::default()
    }

    /// Register (or replace) an analyzer under `name`.
    pub fn register<S: Into<String>>(&self, name: S, analyzer: TextAnalyzer) {
        self.analyzers.write().insert(name.into(), analyzer);
    }

    /// Look up an analyzer by name.
    pub fn get(&self, name: &str) -> Option<TextAnalyzer> {
        self.analyzers.read().get(name).cloned()
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.analyzers.read().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::NgramTokenizer;

    #[test]
    fn test_builtin_analyzers() {
        let registry = AnalyzerRegistry::new();
        for name in ["default", "simple", "whitespace", "raw"] {
            assert!(registry.contains(name), "missing builtin `{name}`");
        }
        assert!(!registry.contains("ngram3"));
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = AnalyzerRegistry::new();
        registry.register(
            "ngram3",
            TextAnalyzer::builder(NgramTokenizer::new(3, 3).unwrap())
                .filter(LowerCaser)
                .build(),
        );
        let analyzer = registry.get("ngram3").unwrap();
        let tokens = analyzer.analyze("Rust");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["rus", "ust"]);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = AnalyzerRegistry::new();
        let b = AnalyzerRegistry::new();
        a.register("custom", TextAnalyzer::new(RawTokenizer));
        assert!(a.contains("custom"));
        assert!(!b.contains("custom"));
    }
}
