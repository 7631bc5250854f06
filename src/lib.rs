//! # Fathom
//!
//! An embeddable full-text search engine library for Rust.
//!
//! ## Features
//!
//! - Typed schemas with text, numeric, date, IP, bytes, JSON, and
//!   hierarchical facet fields
//! - Immutable segments with fst term dictionaries, positional postings,
//!   stored fields, and columnar fast fields
//! - A single-writer / many-reader model with snapshot-isolated searchers
//!   and background segment merging
//! - BM25 scoring with a rich query model: term, phrase, fuzzy, regex,
//!   range, boolean, boosting, and more-like-this queries
//! - A query-string parser with strict and lenient modes
//! - Pluggable storage: local directory or in-memory
//!
//! ## Example
//!
//! ```
//! use fathom::schema::{FieldOptions, Schema};
//! use fathom::{Index, QueryParser};
//!
//! # fn main() -> fathom::Result<()> {
//! let mut builder = Schema::builder();
//! let title = builder.add_text_field("title", FieldOptions::default());
//! let schema = builder.build()?;
//!
//! let index = Index::create_in_ram(schema.clone())?;
//! let mut writer = index.writer()?;
//! let mut doc = fathom::schema::Document::new();
//! doc.add_text(title, "the old man and the sea");
//! writer.add_document(doc)?;
//! writer.commit()?;
//!
//! let reader = index.reader()?;
//! let searcher = reader.searcher();
//! let parser = QueryParser::for_index(&index, vec![title]);
//! let query = parser.parse("sea")?;
//! let results = searcher.search(&query, 10)?;
//! assert_eq!(results.count, 1);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
mod error;
pub mod index;
pub mod postings;
pub mod query;
pub mod schema;
pub mod search;
pub mod segment;
pub mod storage;
mod util;

// Re-exports for the public API
pub use analysis::analyzer::TextAnalyzer;
pub use analysis::registry::AnalyzerRegistry;
pub use error::{FathomError, Result};
pub use index::writer::WriterState;
pub use index::{Index, IndexMeta, IndexReader, IndexWriter};
pub use query::facets::FacetCounts;
pub use query::{Explanation, Occur, Query, QueryParser};
pub use schema::facet::Facet;
pub use schema::{Document, Field, FieldOptions, FieldType, Schema, Term, Value};
pub use search::{DocAddress, Hit, Order, SearchOptions, SearchResults, Searcher};
pub use storage::{FsStorage, MemoryStorage, Storage};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
