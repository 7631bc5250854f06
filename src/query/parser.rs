//! The query-string parser.
//!
//! Grammar sketch (whitespace separates clauses):
//!
//! ```text
//! clause    := [+|-] [field ":"] body ["^" boost]
//! body      := term ["~" distance]
//!            | '"' phrase '"' ["~" slop]
//!            | ("[" | "{") value " TO " value ("]" | "}")
//!            | "*"
//! ```
//!
//! Unqualified clauses fan out over the parser's default fields as Should
//! clauses with `minimum_should_match = 1`. The strict entry point fails on
//! the first bad clause; the lenient one collects one human-readable error
//! per failing clause and still returns the query built from the rest. A
//! lone unescaped quote is treated as a literal character rather than a
//! syntax error.

use std::ops::Bound;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::registry::{AnalyzerRegistry, DEFAULT_ANALYZER_NAME};
use crate::error::{FathomError, Result};
use crate::query::{Occur, Query};
use crate::schema::{Facet, Field, FieldType, Schema, Term, Value};

/// Fuzzy matching defaults a field can opt into for unqualified terms.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyConfig {
    /// Maximum edit distance.
    pub distance: u8,
    /// Whether transpositions count as one edit.
    pub transposition_cost_one: bool,
    /// Whether prefix matching is enabled.
    pub prefix: bool,
}

/// Parses query strings against a schema.
pub struct QueryParser {
    schema: Schema,
    registry: Arc<AnalyzerRegistry>,
    default_fields: Vec<Field>,
    boosts: AHashMap<u32, f32>,
    fuzzy: AHashMap<u32, FuzzyConfig>,
}

#[derive(Debug, Clone)]
enum ClauseBody {
    Text {
        text: String,
        phrase: bool,
        slop: u32,
        fuzzy: Option<u8>,
    },
    Group(String),
    Range {
        lower: Bound<String>,
        upper: Bound<String>,
    },
    All,
}

#[derive(Debug, Clone)]
struct RawClause {
    occur: Option<Occur>,
    field: Option<String>,
    body: ClauseBody,
    boost: Option<f32>,
}

impl QueryParser {
    /// A parser searching `default_fields` for unqualified terms.
    pub fn new(
        schema: Schema,
        default_fields: Vec<Field>,
        registry: Arc<AnalyzerRegistry>,
    ) -> QueryParser {
        QueryParser {
            schema,
            registry,
            default_fields,
            boosts: AHashMap::new(),
            fuzzy: AHashMap::new(),
        }
    }

    /// A parser bound to an index's schema and analyzers.
    pub fn for_index(index: &crate::index::Index, default_fields: Vec<Field>) -> QueryParser {
        QueryParser::new(
            index.schema().clone(),
            default_fields,
            index.registry_handle(),
        )
    }

    /// Boost every clause targeting `field` by `boost`.
    pub fn set_field_boost(&mut self, field: Field, boost: f32) {
        self.boosts.insert(field.0, boost);
    }

    /// Match unqualified terms on `field` fuzzily.
    pub fn set_field_fuzzy(
        &mut self,
        field: Field,
        prefix: bool,
        distance: u8,
        transposition_cost_one: bool,
    ) {
        self.fuzzy.insert(
            field.0,
            FuzzyConfig {
                distance,
                transposition_cost_one,
                prefix,
            },
        );
    }

    /// Strict parse; fails on the first unparseable clause.
    pub fn parse(&self, input: &str) -> Result<Query> {
        let mut errors = Vec::new();
        let query = self.parse_inner(input, &mut errors);
        match errors.into_iter().next() {
            Some(message) => Err(FathomError::query(message)),
            None => query.ok_or_else(|| FathomError::query("Empty query string")),
        }
    }

    /// Lenient parse; collects one error per failing clause and returns the
    /// best-effort query over the remainder (an empty, match-nothing
    /// boolean when nothing parsed).
    pub fn parse_lenient(&self, input: &str) -> (Query, Vec<String>) {
        let mut errors = Vec::new();
        let query = self
            .parse_inner(input, &mut errors)
            .unwrap_or_else(|| Query::boolean(Vec::new(), 0));
        (query, errors)
    }

    fn parse_inner(&self, input: &str, errors: &mut Vec<String>) -> Option<Query> {
        let raw_clauses = lex(input);
        let mut clauses: Vec<(Occur, Query)> = Vec::new();
        for raw in raw_clauses {
            match self.build_clause(&raw) {
                Ok(Some(query)) => {
                    clauses.push((raw.occur.unwrap_or(Occur::Should), query));
                }
                Ok(None) => {} // analyzed to nothing, e.g. a stopword
                Err(err) => errors.push(err.to_string()),
            }
        }
        if clauses.is_empty() {
            return None;
        }
        if clauses.len() == 1 && clauses[0].0 == Occur::Should {
            return Some(clauses.into_iter().next().map(|(_, q)| q).unwrap_or(Query::All));
        }
        let has_must = clauses.iter().any(|(occur, _)| *occur == Occur::Must);
        let has_should = clauses.iter().any(|(occur, _)| *occur == Occur::Should);
        let minimum_should_match = if has_should && !has_must { 1 } else { 0 };
        Some(Query::boolean(clauses, minimum_should_match))
    }

    fn build_clause(&self, raw: &RawClause) -> Result<Option<Query>> {
        if let ClauseBody::Group(inner) = &raw.body {
            if raw.field.is_some() {
                return Err(FathomError::query(
                    "Grouped sub-queries cannot be field-qualified",
                ));
            }
            let mut inner_errors = Vec::new();
            let query = self.parse_inner(inner, &mut inner_errors);
            if let Some(message) = inner_errors.into_iter().next() {
                return Err(FathomError::query(message));
            }
            return Ok(match (query, raw.boost) {
                (Some(query), Some(boost)) => Some(Query::boost(query, boost)),
                (query, _) => query,
            });
        }
        let query = match &raw.field {
            Some(name) => {
                let field = self.schema.get_field(name)?;
                self.build_for_field(field, raw)?
            }
            None => {
                if let ClauseBody::All = raw.body {
                    Some(Query::All)
                } else if let ClauseBody::Range { .. } = raw.body {
                    return Err(FathomError::query(
                        "Range queries require an explicit field",
                    ));
                } else {
                    if self.default_fields.is_empty() {
                        return Err(FathomError::query(
                            "No default fields configured for unqualified terms",
                        ));
                    }
                    let mut sub_clauses = Vec::new();
                    for &field in &self.default_fields {
                        if let Some(query) = self.build_for_field(field, raw)? {
                            sub_clauses.push((Occur::Should, query));
                        }
                    }
                    match sub_clauses.len() {
                        0 => None,
                        1 => Some(sub_clauses.into_iter().next().map(|(_, q)| q).unwrap_or(Query::All)),
                        _ => Some(Query::boolean(sub_clauses, 1)),
                    }
                }
            }
        };
        Ok(match (query, raw.boost) {
            (Some(query), Some(boost)) => Some(Query::boost(query, boost)),
            (query, _) => query,
        })
    }

    fn build_for_field(&self, field: Field, raw: &RawClause) -> Result<Option<Query>> {
        let entry = self.schema.get_field_entry(field).clone();
        let base = match &raw.body {
            // groups are resolved in build_clause before field dispatch
            ClauseBody::Group(_) => None,
            ClauseBody::All => Some(Query::All),
            ClauseBody::Range { lower, upper } => {
                let parse_bound = |bound: &Bound<String>| -> Result<Bound<Value>> {
                    Ok(match bound {
                        Bound::Included(text) => {
                            Bound::Included(self.parse_value(field, &entry.field_type, text)?)
                        }
                        Bound::Excluded(text) => {
                            Bound::Excluded(self.parse_value(field, &entry.field_type, text)?)
                        }
                        Bound::Unbounded => Bound::Unbounded,
                    })
                };
                Some(Query::range(
                    &self.schema,
                    field,
                    parse_bound(lower)?,
                    parse_bound(upper)?,
                )?)
            }
            ClauseBody::Text {
                text,
                phrase,
                slop,
                fuzzy,
            } => match entry.field_type {
                FieldType::Text | FieldType::Json => {
                    let analyzer_name = entry
                        .options
                        .tokenizer
                        .as_deref()
                        .unwrap_or(DEFAULT_ANALYZER_NAME);
                    let analyzer = self.registry.get(analyzer_name).ok_or_else(|| {
                        FathomError::config(format!(
                            "Analyzer `{analyzer_name}` is not registered"
                        ))
                    })?;
                    let make_term = |token_text: &str| {
                        if entry.field_type == FieldType::Json {
                            Term::from_field_json_text(field, token_text)
                        } else {
                            Term::from_field_text(field, token_text)
                        }
                    };
                    let tokens = analyzer.analyze(text);
                    match tokens.len() {
                        0 => None,
                        1 => {
                            let term = make_term(&tokens[0].text);
                            let fuzzy_config = fuzzy
                                .map(|distance| FuzzyConfig {
                                    distance,
                                    transposition_cost_one: true,
                                    prefix: false,
                                })
                                .or_else(|| self.fuzzy.get(&field.0).copied());
                            match fuzzy_config {
                                Some(config) if config.distance > 0 => Some(Query::fuzzy(
                                    term,
                                    config.distance,
                                    config.transposition_cost_one,
                                    config.prefix,
                                )),
                                _ => Some(Query::Term(term)),
                            }
                        }
                        _ => {
                            let terms = tokens.iter().map(|t| make_term(&t.text)).collect();
                            let slop = if *phrase { *slop } else { 0 };
                            Some(Query::phrase(field, terms, slop)?)
                        }
                    }
                }
                _ => {
                    if *phrase || fuzzy.is_some() {
                        return Err(FathomError::query(format!(
                            "Field `{}` ({}) supports neither phrases nor fuzzy matching",
                            entry.name,
                            entry.field_type.name()
                        )));
                    }
                    let value = self.parse_value(field, &entry.field_type, text)?;
                    Some(Query::Term(crate::query::value_to_term(
                        &self.schema,
                        field,
                        &value,
                    )?))
                }
            },
        };
        let boosted = match (base, self.boosts.get(&field.0)) {
            (Some(query), Some(&boost)) => Some(Query::boost(query, boost)),
            (query, _) => query,
        };
        Ok(boosted)
    }

    fn parse_value(&self, field: Field, field_type: &FieldType, text: &str) -> Result<Value> {
        let name = self.schema.get_field_name(field);
        let bad = |detail: &str| {
            FathomError::query(format!("Invalid {detail} value `{text}` for field `{name}`"))
        };
        Ok(match field_type {
            FieldType::Text | FieldType::Json => Value::Str(text.to_string()),
            FieldType::U64 => Value::U64(text.parse().map_err(|_| bad("u64"))?),
            FieldType::I64 => Value::I64(text.parse().map_err(|_| bad("i64"))?),
            FieldType::F64 => Value::F64(text.parse().map_err(|_| bad("f64"))?),
            FieldType::Bool => Value::Bool(text.parse().map_err(|_| bad("bool"))?),
            FieldType::Date => Value::Date(
                chrono::DateTime::parse_from_rfc3339(text)
                    .map_err(|_| bad("rfc3339 date"))?
                    .with_timezone(&chrono::Utc),
            ),
            FieldType::Ip => Value::Ip(text.parse().map_err(|_| bad("ip address"))?),
            FieldType::Facet => Value::Facet(Facet::from_text(text)?),
            FieldType::Bytes => {
                return Err(FathomError::query(format!(
                    "Field `{name}` (bytes) cannot be queried from a query string"
                )));
            }
        })
    }
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn lex(input: &str) -> Vec<RawClause> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0usize;
    let mut clauses = Vec::new();

    while pos < chars.len() {
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        let occur = match chars[pos] {
            '+' => {
                pos += 1;
                Some(Occur::Must)
            }
            '-' => {
                pos += 1;
                Some(Occur::MustNot)
            }
            _ => None,
        };

        // optional `field:` prefix
        let mut field = None;
        let mark = pos;
        while pos < chars.len() && is_field_char(chars[pos]) {
            pos += 1;
        }
        if pos > mark && pos < chars.len() && chars[pos] == ':' {
            field = Some(chars[mark..pos].iter().collect::<String>());
            pos += 1;
        } else {
            pos = mark;
        }

        let body = if pos < chars.len() && chars[pos] == '(' {
            pos += 1;
            let start = pos;
            let mut depth = 1usize;
            while pos < chars.len() && depth > 0 {
                match chars[pos] {
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                pos += 1;
            }
            let end = if depth == 0 { pos - 1 } else { pos };
            ClauseBody::Group(chars[start..end].iter().collect())
        } else if pos < chars.len() && chars[pos] == '"' {
            pos += 1;
            let start = pos;
            while pos < chars.len() && chars[pos] != '"' {
                pos += 1;
            }
            if pos < chars.len() {
                // proper closing quote
                let text: String = chars[start..pos].iter().collect();
                pos += 1;
                let slop = lex_tilde_number(&chars, &mut pos).unwrap_or(0) as u32;
                ClauseBody::Text {
                    text,
                    phrase: true,
                    slop,
                    fuzzy: None,
                }
            } else {
                // lone unescaped quote: take the remainder as a literal token
                let text: String = chars[start..].iter().collect();
                ClauseBody::Text {
                    text: text.trim().to_string(),
                    phrase: false,
                    slop: 0,
                    fuzzy: None,
                }
            }
        } else if pos < chars.len() && (chars[pos] == '[' || chars[pos] == '{') {
            let lower_inclusive = chars[pos] == '[';
            pos += 1;
            let start = pos;
            while pos < chars.len() && chars[pos] != ']' && chars[pos] != '}' {
                pos += 1;
            }
            let inner: String = chars[start..pos].iter().collect();
            let upper_inclusive = pos < chars.len() && chars[pos] == ']';
            if pos < chars.len() {
                pos += 1;
            }
            let (lower_text, upper_text) = match inner.split_once(" TO ") {
                Some((lo, hi)) => (lo.trim().to_string(), hi.trim().to_string()),
                None => (inner.trim().to_string(), "*".to_string()),
            };
            let make_bound = |text: String, inclusive: bool| {
                if text == "*" || text.is_empty() {
                    Bound::Unbounded
                } else if inclusive {
                    Bound::Included(text)
                } else {
                    Bound::Excluded(text)
                }
            };
            ClauseBody::Range {
                lower: make_bound(lower_text, lower_inclusive),
                upper: make_bound(upper_text, upper_inclusive),
            }
        } else {
            let start = pos;
            while pos < chars.len()
                && !chars[pos].is_whitespace()
                && chars[pos] != '^'
                && chars[pos] != '~'
            {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            if text == "*" {
                ClauseBody::All
            } else {
                let fuzzy = lex_tilde_number(&chars, &mut pos);
                ClauseBody::Text {
                    text,
                    phrase: false,
                    slop: 0,
                    fuzzy,
                }
            }
        };

        // optional ^boost
        let mut boost = None;
        if pos < chars.len() && chars[pos] == '^' {
            pos += 1;
            let start = pos;
            while pos < chars.len() && !chars[pos].is_whitespace() {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            boost = text.parse::<f32>().ok();
        }

        // skip whatever is left of a malformed clause
        while pos < chars.len() && !chars[pos].is_whitespace() {
            pos += 1;
        }

        let skip = matches!(&body, ClauseBody::Text { text, phrase: false, .. } if text.is_empty());
        if !skip {
            clauses.push(RawClause {
                occur,
                field,
                body,
                boost,
            });
        }
    }
    clauses
}

fn lex_tilde_number(chars: &[char], pos: &mut usize) -> Option<u8> {
    if *pos < chars.len() && chars[*pos] == '~' {
        *pos += 1;
        let start = *pos;
        while *pos < chars.len() && chars[*pos].is_ascii_digit() {
            *pos += 1;
        }
        if *pos > start {
            chars[start..*pos].iter().collect::<String>().parse().ok()
        } else {
            Some(1) // bare `~` defaults to distance 1
        }
    } else {
        None
    }
}
