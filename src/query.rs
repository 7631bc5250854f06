//! The query engine: AST, parser, scoring, and per-segment evaluation.
//!
//! [`Query`] is a closed sum type with one variant per supported query
//! kind. Evaluation in [`eval`] matches exhaustively over it, so adding a
//! variant forces every scoring and explain path to handle it. Queries are
//! built either directly through the constructors here or by parsing a
//! query string with [`parser::QueryParser`].

pub mod bm25;
pub mod eval;
pub mod explain;
pub mod facets;
pub mod fuzzy;
pub mod parser;

use std::ops::Bound;

use crate::error::{FathomError, Result};
use crate::schema::term::{TypeCode, date_to_i64, f64_to_u64, i64_to_u64, ip_to_u128};
use crate::schema::{Document, Facet, Field, FieldType, Schema, Term, Value};

pub use explain::Explanation;
pub use parser::QueryParser;

/// How a boolean clause participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match; contributes to the score.
    Must,
    /// The clause may match; contributes to the score when it does.
    Should,
    /// The clause must not match; never contributes to the score.
    MustNot,
}

/// A search query.
#[derive(Debug, Clone)]
pub enum Query {
    /// Matches every live document with a constant score.
    All,
    /// Matches documents containing one exact term.
    Term(Term),
    /// Matches documents containing any of the listed terms (OR).
    TermSet(Vec<Term>),
    /// Matches an ordered sequence of terms within `slop` positional edits.
    Phrase {
        /// The text field the phrase runs over.
        field: Field,
        /// The analyzed terms, in order.
        terms: Vec<Term>,
        /// Maximum positional slack; 0 requires exact adjacency.
        slop: u32,
    },
    /// Matches terms within a bounded Damerau-Levenshtein distance.
    FuzzyTerm {
        /// The probe term.
        term: Term,
        /// Maximum edit distance.
        distance: u8,
        /// When true, adjacent transpositions count as one edit.
        transposition_cost_one: bool,
        /// When true, the probe only needs to fuzzily match a prefix of
        /// the candidate term.
        prefix: bool,
    },
    /// Matches terms whose full text matches a regular expression.
    Regex {
        /// The field scanned.
        field: Field,
        /// Original pattern text.
        pattern: String,
        /// Compiled, anchored pattern.
        regex: regex::Regex,
    },
    /// Matches documents whose indexed value falls within the bounds.
    Range {
        /// The field; must have an ordered value type.
        field: Field,
        /// Lower bound over encoded terms.
        lower: Bound<Term>,
        /// Upper bound over encoded terms.
        upper: Bound<Term>,
    },
    /// Weighted combination of sub-queries.
    Boolean {
        /// The clauses with their occurrence mode.
        clauses: Vec<(Occur, Query)>,
        /// Minimum number of Should clauses that must match, enforced
        /// whether or not Must clauses are present. The parser sets it to
        /// 1 for purely-optional queries and 0 when a Must clause anchors
        /// the query.
        minimum_should_match: usize,
    },
    /// Multiplies the child's scores by a constant factor.
    Boost {
        /// The wrapped query.
        query: Box<Query>,
        /// The multiplier.
        boost: f32,
    },
    /// Matches exactly what the child matches, at a fixed score.
    ConstScore {
        /// The wrapped query.
        query: Box<Query>,
        /// The replacement score.
        score: f32,
    },
    /// Per document, the best child score plus a fraction of the rest.
    DisjunctionMax {
        /// The children.
        disjuncts: Vec<Query>,
        /// Fraction of the non-maximal child scores added to the max.
        tie_breaker: f32,
    },
    /// Matches a facet path, optionally including every descendant path.
    Facet {
        /// The facet field.
        field: Field,
        /// The path to match.
        facet: Facet,
        /// When true, descendant paths match as well.
        include_descendants: bool,
    },
    /// Derives a weighted term query from a reference document.
    MoreLikeThis {
        /// The reference document.
        document: Document,
        /// Cap on the number of expansion terms.
        max_query_terms: usize,
    },
}

/// Encode a typed value as a term for `field`, checking the value kind
/// against the field's declared type.
pub fn value_to_term(schema: &Schema, field: Field, value: &Value) -> Result<Term> {
    let entry = schema.get_field_entry(field);
    let mismatch = || {
        FathomError::query(format!(
            "Field `{}` expects a {} value",
            entry.name,
            entry.field_type.name()
        ))
    };
    let term = match (entry.field_type, value) {
        (FieldType::Text, Value::Str(text)) => Term::from_field_text(field, text),
        (FieldType::U64, Value::U64(v)) => Term::from_field_u64(field, *v),
        (FieldType::I64, Value::I64(v)) => Term::from_field_i64(field, *v),
        (FieldType::F64, Value::F64(v)) => Term::from_field_f64(field, *v),
        (FieldType::Bool, Value::Bool(v)) => Term::from_field_bool(field, *v),
        (FieldType::Date, Value::Date(v)) => Term::from_field_date(field, *v),
        (FieldType::Facet, Value::Facet(facet)) => Term::from_field_facet(field, facet),
        (FieldType::Bytes, Value::Bytes(bytes)) => Term::from_field_bytes(field, bytes),
        (FieldType::Ip, Value::Ip(addr)) => Term::from_field_ip(field, *addr),
        (FieldType::Json, Value::Str(text)) => Term::from_field_json_text(field, text),
        _ => return Err(mismatch()),
    };
    Ok(term)
}

impl Query {
    /// A single-term query.
    pub fn term(term: Term) -> Query {
        Query::Term(term)
    }

    /// An OR over the listed terms; a document matching several of them
    /// scores the sum of the per-term scores.
    pub fn term_set(terms: Vec<Term>) -> Query {
        Query::TermSet(terms)
    }

    /// A phrase query; fails on fewer than two terms.
    pub fn phrase(field: Field, terms: Vec<Term>, slop: u32) -> Result<Query> {
        if terms.len() < 2 {
            return Err(FathomError::query(
                "A phrase query requires at least two terms",
            ));
        }
        Ok(Query::Phrase { field, terms, slop })
    }

    /// A fuzzy term query over a text field.
    pub fn fuzzy(term: Term, distance: u8, transposition_cost_one: bool, prefix: bool) -> Query {
        Query::FuzzyTerm {
            term,
            distance,
            transposition_cost_one,
            prefix,
        }
    }

    /// A regex query. The pattern is compiled (and validated) here, and
    /// anchored so it must match the entire term text.
    pub fn regex(field: Field, pattern: &str) -> Result<Query> {
        let regex = regex::Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| FathomError::query(format!("Invalid regex pattern: {e}")))?;
        Ok(Query::Regex {
            field,
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// A range query over an ordered field. Rejects fields whose type has
    /// no total order under the term encoding (text, facet, bytes, json)
    /// and value kinds that do not match the field.
    pub fn range(
        schema: &Schema,
        field: Field,
        lower: Bound<Value>,
        upper: Bound<Value>,
    ) -> Result<Query> {
        let entry = schema.get_field_entry(field);
        if !entry.field_type.is_ordered() {
            return Err(FathomError::query(format!(
                "Field `{}` ({}) does not support range queries",
                entry.name,
                entry.field_type.name()
            )));
        }
        let encode = |bound: Bound<Value>| -> Result<Bound<Term>> {
            Ok(match bound {
                Bound::Included(value) => Bound::Included(value_to_term(schema, field, &value)?),
                Bound::Excluded(value) => Bound::Excluded(value_to_term(schema, field, &value)?),
                Bound::Unbounded => Bound::Unbounded,
            })
        };
        Ok(Query::Range {
            field,
            lower: encode(lower)?,
            upper: encode(upper)?,
        })
    }

    /// A boolean query with an explicit minimum-should-match.
    pub fn boolean(clauses: Vec<(Occur, Query)>, minimum_should_match: usize) -> Query {
        Query::Boolean {
            clauses,
            minimum_should_match,
        }
    }

    /// Wrap a query with a score multiplier.
    pub fn boost(query: Query, boost: f32) -> Query {
        Query::Boost {
            query: Box::new(query),
            boost,
        }
    }

    /// Wrap a query with a fixed score.
    pub fn const_score(query: Query, score: f32) -> Query {
        Query::ConstScore {
            query: Box::new(query),
            score,
        }
    }

    /// A disjunction-max over child queries.
    pub fn disjunction_max(disjuncts: Vec<Query>, tie_breaker: f32) -> Query {
        Query::DisjunctionMax {
            disjuncts,
            tie_breaker,
        }
    }

    /// An exact facet match.
    pub fn facet(field: Field, facet: Facet) -> Query {
        Query::Facet {
            field,
            facet,
            include_descendants: false,
        }
    }

    /// A facet match including every descendant path.
    pub fn facet_descendants(field: Field, facet: Facet) -> Query {
        Query::Facet {
            field,
            facet,
            include_descendants: true,
        }
    }

    /// A more-like-this query seeded from a reference document.
    pub fn more_like_this(document: Document) -> Query {
        Query::MoreLikeThis {
            document,
            max_query_terms: 25,
        }
    }
}

/// Map a raw u64 fast value back into term bytes space for range
/// comparisons against a field's declared type.
pub(crate) fn fast_value_for(field_type: FieldType, value: &Value) -> Option<u64> {
    match (field_type, value) {
        (FieldType::U64, Value::U64(v)) => Some(*v),
        (FieldType::I64, Value::I64(v)) => Some(i64_to_u64(*v)),
        (FieldType::F64, Value::F64(v)) => Some(f64_to_u64(*v)),
        (FieldType::Bool, Value::Bool(v)) => Some(*v as u64),
        (FieldType::Date, Value::Date(v)) => Some(i64_to_u64(date_to_i64(*v))),
        _ => None,
    }
}

/// The 128-bit fast value of an IP, when the kinds line up.
pub(crate) fn fast_value_u128_for(field_type: FieldType, value: &Value) -> Option<u128> {
    match (field_type, value) {
        (FieldType::Ip, Value::Ip(addr)) => Some(ip_to_u128(*addr)),
        _ => None,
    }
}

/// The type code terms of `field` carry in the dictionary.
pub(crate) fn type_code_of(schema: &Schema, field: Field) -> TypeCode {
    TypeCode::for_field_type(schema.get_field_entry(field).field_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;

    fn schema() -> (Schema, Field, Field) {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", FieldOptions::default());
        let year = builder.add_u64_field("year", FieldOptions::default());
        (builder.build().unwrap(), title, year)
    }

    #[test]
    fn test_invalid_regex_rejected_at_build() {
        let (_, title, _) = schema();
        assert!(Query::regex(title, "se(a").is_err());
        assert!(Query::regex(title, "se.a").is_ok());
    }

    #[test]
    fn test_range_rejects_text_field() {
        let (schema, title, year) = schema();
        let err = Query::range(
            &schema,
            title,
            Bound::Included(Value::Str("a".into())),
            Bound::Unbounded,
        )
        .unwrap_err();
        assert!(err.to_string().contains("range"));

        assert!(Query::range(
            &schema,
            year,
            Bound::Included(Value::U64(1900)),
            Bound::Excluded(Value::U64(2000)),
        )
        .is_ok());
    }

    #[test]
    fn test_range_rejects_wrong_value_kind() {
        let (schema, _, year) = schema();
        assert!(Query::range(
            &schema,
            year,
            Bound::Included(Value::Str("1900".into())),
            Bound::Unbounded,
        )
        .is_err());
    }

    #[test]
    fn test_phrase_needs_two_terms() {
        let (_, title, _) = schema();
        assert!(Query::phrase(title, vec![Term::from_field_text(title, "sea")], 0).is_err());
    }
}
