//! Per-segment query evaluation and scoring.
//!
//! A query is evaluated independently against each segment; the searcher
//! merges the per-segment results. Evaluation returns `(doc id, score)`
//! pairs sorted by doc id, already filtered to live documents. Statistics
//! feeding BM25 are corpus-wide (see [`crate::query::bm25`]), so scores do
//! not shift when segments merge.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::registry::{AnalyzerRegistry, DEFAULT_ANALYZER_NAME};
use crate::error::{FathomError, Result};
use crate::postings::DocId;
use crate::query::bm25::{Bm25Weight, CorpusStats};
use crate::query::explain::Explanation;
use crate::query::fuzzy::within_distance;
use crate::query::{Occur, Query, value_to_term};
use crate::schema::term::TypeCode;
use crate::schema::{Document, Field, FieldType, Schema, Term, Value};
use crate::segment::SegmentReader;

/// Everything evaluation needs besides the target segment.
pub struct EvalContext<'a> {
    /// The index schema.
    pub schema: &'a Schema,
    /// The per-index analyzer registry.
    pub registry: &'a AnalyzerRegistry,
    /// Corpus-wide scoring statistics.
    pub stats: &'a CorpusStats,
    /// The full segment snapshot, for global document frequencies.
    pub segments: &'a [Arc<SegmentReader>],
}

/// Evaluate `query` against one segment.
pub fn eval_segment(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    query: &Query,
) -> Result<Vec<(DocId, f32)>> {
    match query {
        Query::All => {
            let mut hits = Vec::with_capacity(segment.num_alive() as usize);
            for doc_id in 0..segment.max_doc() {
                if segment.is_alive(doc_id) {
                    hits.push((doc_id, 1.0));
                }
            }
            Ok(hits)
        }
        Query::Term(term) => score_term(ctx, segment, term),
        Query::TermSet(terms) => {
            let mut acc: BTreeMap<DocId, f32> = BTreeMap::new();
            for term in terms {
                for (doc_id, score) in score_term(ctx, segment, term)? {
                    *acc.entry(doc_id).or_insert(0.0) += score;
                }
            }
            Ok(acc.into_iter().collect())
        }
        Query::Phrase { field, terms, slop } => eval_phrase(ctx, segment, *field, terms, *slop),
        Query::FuzzyTerm {
            term,
            distance,
            transposition_cost_one,
            prefix,
        } => {
            let probe = term.as_text().ok_or_else(|| {
                FathomError::query("Fuzzy queries require a text term".to_string())
            })?;
            let field = term.field();
            let dict_prefix = Term::field_prefix(field, crate::query::type_code_of(ctx.schema, field));
            let mut acc: BTreeMap<DocId, f32> = BTreeMap::new();
            for (key, _) in segment.term_dict().prefix(&dict_prefix) {
                let candidate_term = Term::from_bytes(key);
                let Some(candidate) = candidate_term.as_text() else {
                    continue;
                };
                if within_distance(probe, candidate, *distance, *transposition_cost_one, *prefix) {
                    for (doc_id, score) in score_term(ctx, segment, &candidate_term)? {
                        let entry = acc.entry(doc_id).or_insert(0.0);
                        // a doc matching several fuzzy expansions keeps its best
                        *entry = entry.max(score);
                    }
                }
            }
            Ok(acc.into_iter().collect())
        }
        Query::Regex { field, regex, .. } => {
            let dict_prefix = Term::field_prefix(*field, crate::query::type_code_of(ctx.schema, *field));
            let mut docs: BTreeSet<DocId> = BTreeSet::new();
            for (key, info) in segment.term_dict().prefix(&dict_prefix) {
                let candidate_term = Term::from_bytes(key);
                let Some(text) = candidate_term.as_text() else {
                    continue;
                };
                if regex.is_match(text) {
                    let list = segment.postings_for_info(&info)?;
                    for posting in &list.postings {
                        if segment.is_alive(posting.doc_id) {
                            docs.insert(posting.doc_id);
                        }
                    }
                }
            }
            Ok(docs.into_iter().map(|doc_id| (doc_id, 1.0)).collect())
        }
        Query::Range { field, lower, upper } => {
            let dict_prefix = Term::field_prefix(*field, crate::query::type_code_of(ctx.schema, *field));
            let lower_bytes = match lower {
                Bound::Included(term) => Bound::Included(term.as_bytes()),
                Bound::Excluded(term) => Bound::Excluded(term.as_bytes()),
                Bound::Unbounded => Bound::Included(dict_prefix.as_slice()),
            };
            let upper_bytes = match upper {
                Bound::Included(term) => Bound::Included(term.as_bytes()),
                Bound::Excluded(term) => Bound::Excluded(term.as_bytes()),
                Bound::Unbounded => Bound::Unbounded,
            };
            let mut docs: BTreeSet<DocId> = BTreeSet::new();
            for (key, info) in segment.term_dict().range(lower_bytes, upper_bytes) {
                if !key.starts_with(&dict_prefix) {
                    continue;
                }
                let list = segment.postings_for_info(&info)?;
                for posting in &list.postings {
                    if segment.is_alive(posting.doc_id) {
                        docs.insert(posting.doc_id);
                    }
                }
            }
            Ok(docs.into_iter().map(|doc_id| (doc_id, 1.0)).collect())
        }
        Query::Boolean {
            clauses,
            minimum_should_match,
        } => eval_boolean(ctx, segment, clauses, *minimum_should_match),
        Query::Boost { query, boost } => {
            let mut hits = eval_segment(ctx, segment, query)?;
            for (_, score) in hits.iter_mut() {
                *score *= boost;
            }
            Ok(hits)
        }
        Query::ConstScore { query, score } => {
            let mut hits = eval_segment(ctx, segment, query)?;
            for (_, hit_score) in hits.iter_mut() {
                *hit_score = *score;
            }
            Ok(hits)
        }
        Query::DisjunctionMax {
            disjuncts,
            tie_breaker,
        } => {
            // track (max, sum) per doc
            let mut acc: BTreeMap<DocId, (f32, f32)> = BTreeMap::new();
            for disjunct in disjuncts {
                for (doc_id, score) in eval_segment(ctx, segment, disjunct)? {
                    let entry = acc.entry(doc_id).or_insert((f32::MIN, 0.0));
                    entry.0 = entry.0.max(score);
                    entry.1 += score;
                }
            }
            Ok(acc
                .into_iter()
                .map(|(doc_id, (max, sum))| (doc_id, max + tie_breaker * (sum - max)))
                .collect())
        }
        Query::Facet {
            field,
            facet,
            include_descendants,
        } => {
            let term = Term::from_field_facet(*field, facet);
            if *include_descendants {
                let mut docs: BTreeSet<DocId> = BTreeSet::new();
                for (_, info) in segment.term_dict().prefix(term.as_bytes()) {
                    let list = segment.postings_for_info(&info)?;
                    for posting in &list.postings {
                        if segment.is_alive(posting.doc_id) {
                            docs.insert(posting.doc_id);
                        }
                    }
                }
                Ok(docs.into_iter().map(|doc_id| (doc_id, 1.0)).collect())
            } else {
                let mut hits = Vec::new();
                if let Some(list) = segment.postings(&term)? {
                    for posting in &list.postings {
                        if segment.is_alive(posting.doc_id) {
                            hits.push((posting.doc_id, 1.0));
                        }
                    }
                }
                Ok(hits)
            }
        }
        Query::MoreLikeThis {
            document,
            max_query_terms,
        } => {
            let expanded = expand_more_like_this(ctx, document, *max_query_terms)?;
            eval_segment(ctx, segment, &expanded)
        }
    }
}

/// Doc ids matched by `query` in one segment, without scores.
pub fn matching_docs(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    query: &Query,
) -> Result<Vec<DocId>> {
    Ok(eval_segment(ctx, segment, query)?
        .into_iter()
        .map(|(doc_id, _)| doc_id)
        .collect())
}

fn score_term(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    term: &Term,
) -> Result<Vec<(DocId, f32)>> {
    let Some(list) = segment.postings(term)? else {
        return Ok(Vec::new());
    };
    let field = term.field();
    let df = ctx.stats.doc_freq(ctx.segments, term);
    let weight = Bm25Weight::new(ctx.stats, field, df);
    let mut hits = Vec::with_capacity(list.postings.len());
    for posting in &list.postings {
        if segment.is_alive(posting.doc_id) {
            let length = segment.field_length(field, posting.doc_id);
            hits.push((posting.doc_id, weight.score(posting.term_freq, length)));
        }
    }
    Ok(hits)
}

/// Number of in-order matches of the phrase given per-term position lists,
/// allowing `slop` extra positions between the first and last term.
fn phrase_freq(position_lists: &[&[u32]], slop: u32) -> u32 {
    let Some(first) = position_lists.first() else {
        return 0;
    };
    let mut count = 0u32;
    for &start in *first {
        let mut prev = start;
        let mut matched = true;
        for positions in &position_lists[1..] {
            // smallest position strictly after the previous term
            match positions.iter().find(|&&p| p > prev) {
                Some(&p) => prev = p,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            let span = prev - start;
            if span <= position_lists.len() as u32 - 1 + slop {
                count += 1;
            }
        }
    }
    count
}

fn eval_phrase(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    field: Field,
    terms: &[Term],
    slop: u32,
) -> Result<Vec<(DocId, f32)>> {
    let mut lists = Vec::with_capacity(terms.len());
    let mut idf_sum = 0.0f32;
    for term in terms {
        match segment.postings(term)? {
            Some(list) => {
                let df = ctx.stats.doc_freq(ctx.segments, term);
                idf_sum += ctx.stats.idf(df);
                lists.push(list);
            }
            // one missing term empties the whole phrase
            None => return Ok(Vec::new()),
        }
    }
    let weight = Bm25Weight {
        idf: idf_sum,
        avg_field_length: ctx.stats.avg_field_length(field),
    };

    // intersect on doc id, walking all lists in lockstep
    let mut cursors = vec![0usize; lists.len()];
    let mut hits = Vec::new();
    'outer: loop {
        let Some(first_posting) = lists[0].postings.get(cursors[0]) else {
            break;
        };
        let mut target = first_posting.doc_id;
        let mut agreed = true;
        for (idx, list) in lists.iter().enumerate().skip(1) {
            while let Some(posting) = list.postings.get(cursors[idx]) {
                if posting.doc_id >= target {
                    break;
                }
                cursors[idx] += 1;
            }
            match list.postings.get(cursors[idx]) {
                Some(posting) if posting.doc_id == target => {}
                Some(posting) => {
                    target = posting.doc_id;
                    // realign the leading cursor to the new candidate
                    while let Some(lead) = lists[0].postings.get(cursors[0]) {
                        if lead.doc_id >= target {
                            break;
                        }
                        cursors[0] += 1;
                    }
                    agreed = false;
                    break;
                }
                None => break 'outer,
            }
        }
        if !agreed {
            continue;
        }
        let doc_id = target;
        if segment.is_alive(doc_id) {
            let positions: Vec<&[u32]> = cursors
                .iter()
                .enumerate()
                .map(|(idx, &c)| lists[idx].postings[c].positions.as_slice())
                .collect();
            let freq = phrase_freq(&positions, slop);
            if freq > 0 {
                let length = segment.field_length(field, doc_id);
                hits.push((doc_id, weight.score(freq, length)));
            }
        }
        cursors[0] += 1;
    }
    Ok(hits)
}

fn eval_boolean(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    clauses: &[(Occur, Query)],
    minimum_should_match: usize,
) -> Result<Vec<(DocId, f32)>> {
    let mut num_musts = 0usize;
    let mut num_shoulds = 0usize;
    // per doc: (musts matched, should matched, score)
    let mut acc: BTreeMap<DocId, (usize, usize, f32)> = BTreeMap::new();
    let mut excluded: BTreeSet<DocId> = BTreeSet::new();

    for (occur, child) in clauses {
        match occur {
            Occur::Must => {
                num_musts += 1;
                for (doc_id, score) in eval_segment(ctx, segment, child)? {
                    let entry = acc.entry(doc_id).or_insert((0, 0, 0.0));
                    entry.0 += 1;
                    entry.2 += score;
                }
            }
            Occur::Should => {
                num_shoulds += 1;
                for (doc_id, score) in eval_segment(ctx, segment, child)? {
                    let entry = acc.entry(doc_id).or_insert((0, 0, 0.0));
                    entry.1 += 1;
                    entry.2 += score;
                }
            }
            Occur::MustNot => {
                for (doc_id, _) in eval_segment(ctx, segment, child)? {
                    excluded.insert(doc_id);
                }
            }
        }
    }
    if num_musts == 0 && num_shoulds == 0 {
        return Ok(Vec::new());
    }
    let required_shoulds = if num_shoulds == 0 {
        0
    } else {
        minimum_should_match.min(num_shoulds)
    };
    Ok(acc
        .into_iter()
        .filter(|(doc_id, (musts, shoulds, _))| {
            *musts == num_musts && *shoulds >= required_shoulds && !excluded.contains(doc_id)
        })
        .map(|(doc_id, (_, _, score))| (doc_id, score))
        .collect())
}

/// Expand a more-like-this query into a weighted boolean over the
/// reference document's most frequent terms.
pub fn expand_more_like_this(
    ctx: &EvalContext<'_>,
    document: &Document,
    max_query_terms: usize,
) -> Result<Query> {
    let mut counts: AHashMap<Term, u32> = AHashMap::new();
    for fv in document.field_values() {
        let entry = ctx.schema.get_field_entry(fv.field);
        if !entry.options.indexed {
            continue;
        }
        match (entry.field_type, &fv.value) {
            (FieldType::Text, Value::Str(text)) => {
                let name = entry
                    .options
                    .tokenizer
                    .as_deref()
                    .unwrap_or(DEFAULT_ANALYZER_NAME);
                let analyzer = ctx.registry.get(name).ok_or_else(|| {
                    FathomError::config(format!("Analyzer `{name}` is not registered"))
                })?;
                for token in analyzer.analyze(text) {
                    *counts
                        .entry(Term::from_field_text(fv.field, &token.text))
                        .or_insert(0) += 1;
                }
            }
            (FieldType::Facet, _) | (FieldType::Bytes, _) | (FieldType::Json, _) => {}
            _ => {
                if let Ok(term) = value_to_term(ctx.schema, fv.field, &fv.value) {
                    *counts.entry(term).or_insert(0) += 1;
                }
            }
        }
    }
    let mut weighted: Vec<(Term, u32)> = counts.into_iter().collect();
    weighted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    weighted.truncate(max_query_terms);
    let clauses = weighted
        .into_iter()
        .map(|(term, freq)| {
            (
                Occur::Should,
                Query::boost(Query::Term(term), freq as f32),
            )
        })
        .collect();
    Ok(Query::boolean(clauses, 1))
}

/// Explain the score of one document in one segment.
///
/// A document that does not match produces a zero-valued leaf.
pub fn explain_segment(
    ctx: &EvalContext<'_>,
    segment: &SegmentReader,
    query: &Query,
    doc_id: DocId,
) -> Result<Explanation> {
    let score = eval_segment(ctx, segment, query)?
        .into_iter()
        .find(|(id, _)| *id == doc_id)
        .map(|(_, score)| score);
    let Some(score) = score else {
        return Ok(Explanation::leaf(0.0, "no matching clause"));
    };
    let explanation = match query {
        Query::All => Explanation::leaf(score, "match-all"),
        Query::Term(term) => Explanation::leaf(score, describe_term(ctx.schema, term)),
        Query::TermSet(_) => Explanation::leaf(score, "sum over matching set terms"),
        Query::Phrase { slop, .. } => {
            Explanation::leaf(score, format!("phrase match (slop {slop})"))
        }
        Query::FuzzyTerm { term, distance, .. } => Explanation::leaf(
            score,
            format!(
                "fuzzy match of {} within distance {distance}",
                describe_term(ctx.schema, term)
            ),
        ),
        Query::Regex { pattern, .. } => {
            Explanation::leaf(score, format!("regex match of `{pattern}`"))
        }
        Query::Range { field, .. } => Explanation::leaf(
            score,
            format!("range match on `{}`", ctx.schema.get_field_name(*field)),
        ),
        Query::Facet { facet, .. } => Explanation::leaf(
            score,
            format!("facet match of `{}`", facet.to_path_string()),
        ),
        Query::Boolean { clauses, .. } => {
            let mut details = Vec::new();
            for (occur, child) in clauses {
                if *occur == Occur::MustNot {
                    continue;
                }
                let child_explanation = explain_segment(ctx, segment, child, doc_id)?;
                if child_explanation.value != 0.0 || !child_explanation.details.is_empty() {
                    details.push(child_explanation);
                }
            }
            Explanation::node(score, "sum of clause scores", details)
        }
        Query::Boost { query, boost } => Explanation::node(
            score,
            format!("boost ×{boost}"),
            vec![explain_segment(ctx, segment, query, doc_id)?],
        ),
        Query::ConstScore { query, score: c } => Explanation::node(
            score,
            format!("constant score {c}"),
            vec![explain_segment(ctx, segment, query, doc_id)?],
        ),
        Query::DisjunctionMax {
            disjuncts,
            tie_breaker,
        } => {
            let mut details = Vec::new();
            for disjunct in disjuncts {
                let child_explanation = explain_segment(ctx, segment, disjunct, doc_id)?;
                if child_explanation.value != 0.0 {
                    details.push(child_explanation);
                }
            }
            Explanation::node(
                score,
                format!("max plus {tie_breaker} × remainder"),
                details,
            )
        }
        Query::MoreLikeThis {
            document,
            max_query_terms,
        } => {
            let expanded = expand_more_like_this(ctx, document, *max_query_terms)?;
            Explanation::node(
                score,
                "more-like-this expansion",
                vec![explain_segment(ctx, segment, &expanded, doc_id)?],
            )
        }
    };
    Ok(explanation)
}

fn describe_term(schema: &Schema, term: &Term) -> String {
    let field_name = schema.get_field_name(term.field());
    match term.as_text() {
        Some(text) if term.type_code() == TypeCode::Text as u8 => {
            format!("bm25(term `{text}` in `{field_name}`)")
        }
        _ => format!("bm25(term in `{field_name}`)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;
    use crate::segment::SegmentWriter;
    use crate::storage::memory::MemoryStorage;

    struct Fixture {
        schema: Schema,
        registry: Arc<AnalyzerRegistry>,
        segments: Vec<Arc<SegmentReader>>,
        stats: CorpusStats,
        title: Field,
        year: Field,
    }

    impl Fixture {
        fn ctx(&self) -> EvalContext<'_> {
            EvalContext {
                schema: &self.schema,
                registry: &self.registry,
                stats: &self.stats,
                segments: &self.segments,
            }
        }

        fn segment(&self) -> &SegmentReader {
            &self.segments[0]
        }
    }

    fn books() -> Fixture {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", FieldOptions::default());
        let year = builder.add_u64_field("year", FieldOptions::default().fast());
        let schema = builder.build().unwrap();
        let registry = Arc::new(AnalyzerRegistry::new());
        let storage = MemoryStorage::new();

        let mut writer = SegmentWriter::new(schema.clone(), registry.clone());
        for (text, y) in [
            ("The Old Man and the Sea", 1952u64),
            ("Of Mice and Men", 1937),
            ("The Sea Wolf", 1904),
        ] {
            let mut doc = Document::new();
            doc.add_text(title, text);
            doc.add_u64(year, y);
            writer.add_document(&doc).unwrap();
        }
        let meta = writer.flush(&storage).unwrap();
        let segments = vec![Arc::new(
            SegmentReader::open(&storage, &meta, schema.clone()).unwrap(),
        )];
        let stats = CorpusStats::from_segments(&segments);
        Fixture {
            schema,
            registry,
            segments,
            stats,
            title,
            year,
        }
    }

    fn doc_ids(hits: &[(DocId, f32)]) -> Vec<DocId> {
        hits.iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn test_term_query() {
        let fx = books();
        let query = Query::Term(Term::from_field_text(fx.title, "sea"));
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![0, 2]);
        assert!(hits.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn test_term_set_query() {
        let fx = books();
        let query = Query::term_set(vec![
            Term::from_field_text(fx.title, "mice"),
            Term::from_field_text(fx.title, "wolf"),
        ]);
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![1, 2]);

        // a doc matching two of the listed terms scores the sum
        let overlapping = Query::term_set(vec![
            Term::from_field_text(fx.title, "sea"),
            Term::from_field_text(fx.title, "wolf"),
        ]);
        let hits = eval_segment(&fx.ctx(), fx.segment(), &overlapping).unwrap();
        assert_eq!(doc_ids(&hits), vec![0, 2]);
        let single = eval_segment(
            &fx.ctx(),
            fx.segment(),
            &Query::Term(Term::from_field_text(fx.title, "sea")),
        )
        .unwrap();
        assert!(hits[1].1 > single[1].1);
    }

    #[test]
    fn test_term_set_skips_deleted_docs() {
        use crate::segment::deletes::DeleteSet;
        use crate::storage::Storage;

        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", FieldOptions::default());
        let schema = builder.build().unwrap();
        let registry = Arc::new(AnalyzerRegistry::new());
        let storage = MemoryStorage::new();

        let mut writer = SegmentWriter::new(schema.clone(), registry.clone());
        for text in ["of mice and men", "the sea wolf"] {
            let mut doc = Document::new();
            doc.add_text(title, text);
            writer.add_document(&doc).unwrap();
        }
        let meta = writer.flush(&storage).unwrap();
        let mut deletes = DeleteSet::new(meta.max_doc);
        deletes.delete(1);
        storage
            .atomic_write(&meta.deletes_file(), &deletes.to_bytes())
            .unwrap();

        let segments = vec![Arc::new(
            SegmentReader::open(&storage, &meta, schema.clone()).unwrap(),
        )];
        let stats = CorpusStats::from_segments(&segments);
        let ctx = EvalContext {
            schema: &schema,
            registry: &registry,
            stats: &stats,
            segments: &segments,
        };
        let query = Query::term_set(vec![
            Term::from_field_text(title, "mice"),
            Term::from_field_text(title, "wolf"),
        ]);
        let hits = eval_segment(&ctx, &segments[0], &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![0]);
    }

    #[test]
    fn test_all_query() {
        let fx = books();
        let hits = eval_segment(&fx.ctx(), fx.segment(), &Query::All).unwrap();
        assert_eq!(doc_ids(&hits), vec![0, 1, 2]);
    }

    #[test]
    fn test_phrase_exact_and_slop() {
        let fx = books();
        let exact = Query::phrase(
            fx.title,
            vec![
                Term::from_field_text(fx.title, "old"),
                Term::from_field_text(fx.title, "man"),
            ],
            0,
        )
        .unwrap();
        let hits = eval_segment(&fx.ctx(), fx.segment(), &exact).unwrap();
        assert_eq!(doc_ids(&hits), vec![0]);

        // "old ... sea" are 3 apart in doc 0; slop 0 misses, slop 3 hits
        let make = |slop| {
            Query::phrase(
                fx.title,
                vec![
                    Term::from_field_text(fx.title, "old"),
                    Term::from_field_text(fx.title, "sea"),
                ],
                slop,
            )
            .unwrap()
        };
        assert!(eval_segment(&fx.ctx(), fx.segment(), &make(0)).unwrap().is_empty());
        assert_eq!(
            doc_ids(&eval_segment(&fx.ctx(), fx.segment(), &make(3)).unwrap()),
            vec![0]
        );
    }

    #[test]
    fn test_fuzzy_query() {
        let fx = books();
        let query = Query::fuzzy(Term::from_field_text(fx.title, "mer"), 1, true, false);
        // "mer" ~1 matches "men" but not "mice"
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![1]);
    }

    #[test]
    fn test_regex_query() {
        let fx = books();
        let query = Query::regex(fx.title, "m.n").unwrap();
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        // "man" in doc 0, "men" in doc 1
        assert_eq!(doc_ids(&hits), vec![0, 1]);
    }

    #[test]
    fn test_range_query_bounds() {
        let fx = books();
        let make = |lower, upper| {
            Query::range(&fx.schema, fx.year, lower, upper).unwrap()
        };
        let hits = eval_segment(
            &fx.ctx(),
            fx.segment(),
            &make(
                Bound::Included(Value::U64(1904)),
                Bound::Included(Value::U64(1937)),
            ),
        )
        .unwrap();
        assert_eq!(doc_ids(&hits), vec![1, 2]);

        let hits = eval_segment(
            &fx.ctx(),
            fx.segment(),
            &make(
                Bound::Excluded(Value::U64(1904)),
                Bound::Excluded(Value::U64(1952)),
            ),
        )
        .unwrap();
        assert_eq!(doc_ids(&hits), vec![1]);

        let hits = eval_segment(
            &fx.ctx(),
            fx.segment(),
            &make(Bound::Unbounded, Bound::Excluded(Value::U64(1937))),
        )
        .unwrap();
        assert_eq!(doc_ids(&hits), vec![2]);
    }

    #[test]
    fn test_boolean_must_not() {
        let fx = books();
        let query = Query::boolean(
            vec![
                (
                    Occur::Must,
                    Query::Term(Term::from_field_text(fx.title, "sea")),
                ),
                (
                    Occur::MustNot,
                    Query::Term(Term::from_field_text(fx.title, "wolf")),
                ),
            ],
            0,
        );
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![0]);
    }

    #[test]
    fn test_boolean_minimum_should_match() {
        let fx = books();
        let clauses = vec![
            (
                Occur::Should,
                Query::Term(Term::from_field_text(fx.title, "sea")),
            ),
            (
                Occur::Should,
                Query::Term(Term::from_field_text(fx.title, "old")),
            ),
        ];
        let one = Query::boolean(clauses.clone(), 1);
        assert_eq!(
            doc_ids(&eval_segment(&fx.ctx(), fx.segment(), &one).unwrap()),
            vec![0, 2]
        );
        let two = Query::boolean(clauses, 2);
        assert_eq!(
            doc_ids(&eval_segment(&fx.ctx(), fx.segment(), &two).unwrap()),
            vec![0]
        );
    }

    #[test]
    fn test_boolean_minimum_should_match_with_must() {
        let fx = books();
        // the minimum applies even when a Must clause anchors the query:
        // both "sea" docs satisfy the Must, only doc 0 has "old"
        let query = Query::boolean(
            vec![
                (
                    Occur::Must,
                    Query::Term(Term::from_field_text(fx.title, "sea")),
                ),
                (
                    Occur::Should,
                    Query::Term(Term::from_field_text(fx.title, "old")),
                ),
            ],
            1,
        );
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![0]);
    }

    #[test]
    fn test_const_score_and_boost() {
        let fx = books();
        let term = Query::Term(Term::from_field_text(fx.title, "sea"));
        let constant = Query::const_score(term.clone(), 2.5);
        let hits = eval_segment(&fx.ctx(), fx.segment(), &constant).unwrap();
        assert!(hits.iter().all(|(_, s)| *s == 2.5));

        let boosted = Query::boost(constant, 2.0);
        let hits = eval_segment(&fx.ctx(), fx.segment(), &boosted).unwrap();
        assert!(hits.iter().all(|(_, s)| *s == 5.0));
    }

    #[test]
    fn test_disjunction_max() {
        let fx = books();
        let query = Query::disjunction_max(
            vec![
                Query::const_score(Query::Term(Term::from_field_text(fx.title, "sea")), 2.0),
                Query::const_score(Query::Term(Term::from_field_text(fx.title, "old")), 1.0),
            ],
            0.5,
        );
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        // doc 0 matches both: 2.0 + 0.5 * 1.0
        let doc0 = hits.iter().find(|(id, _)| *id == 0).unwrap();
        assert!((doc0.1 - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_more_like_this() {
        let fx = books();
        let mut reference = Document::new();
        reference.add_text(fx.title, "an old man");
        let query = Query::more_like_this(reference);
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        assert_eq!(doc_ids(&hits), vec![0]);
    }

    #[test]
    fn test_explain_root_matches_score() {
        let fx = books();
        let query = Query::boolean(
            vec![
                (
                    Occur::Should,
                    Query::Term(Term::from_field_text(fx.title, "sea")),
                ),
                (
                    Occur::Should,
                    Query::Term(Term::from_field_text(fx.title, "old")),
                ),
            ],
            1,
        );
        let hits = eval_segment(&fx.ctx(), fx.segment(), &query).unwrap();
        let (doc_id, score) = hits[0];
        let explanation = explain_segment(&fx.ctx(), fx.segment(), &query, doc_id).unwrap();
        assert!((explanation.value - score).abs() < 1e-6);
        assert_eq!(explanation.details.len(), 2);
    }
}
