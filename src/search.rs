//! Search execution over a snapshot of segments.
//!
//! A [`Searcher`] owns a reference-counted snapshot of segment readers.
//! Queries run against every segment independently (in parallel via rayon)
//! and the per-segment hits meet in a bounded top-k merge. Ties break by
//! score descending, then segment ordinal ascending, then doc id
//! ascending; ordering by a fast field replaces scoring order entirely.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::registry::AnalyzerRegistry;
use crate::error::{FathomError, Result};
use crate::postings::DocId;
use crate::query::bm25::CorpusStats;
use crate::query::eval::{EvalContext, eval_segment, explain_segment};
use crate::query::facets::{FacetCounts, count_facets};
use crate::query::{Explanation, Query};
use crate::schema::facet::Facet;
use crate::schema::{Document, FieldType, Schema, Term};
use crate::segment::SegmentReader;

/// The address of one hit inside one searcher snapshot. Not stable across
/// reloads or merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocAddress {
    /// Ordinal of the segment within the snapshot.
    pub segment_ord: u32,
    /// Doc id within that segment.
    pub doc_id: DocId,
}

impl DocAddress {
    /// Build an address.
    pub fn new(segment_ord: u32, doc_id: DocId) -> DocAddress {
        DocAddress {
            segment_ord,
            doc_id,
        }
    }
}

/// Sort direction for fast-field ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Smallest values first.
    Asc,
    /// Largest values first.
    Desc,
}

/// Knobs of one search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits returned.
    pub limit: usize,
    /// Number of leading hits skipped.
    pub offset: usize,
    /// Order by a fast field instead of by score.
    pub order_by: Option<(String, Order)>,
}

impl SearchOptions {
    /// Score-ordered top-`limit`.
    pub fn top(limit: usize) -> SearchOptions {
        SearchOptions {
            limit,
            offset: 0,
            order_by: None,
        }
    }

    /// Skip `offset` hits.
    pub fn offset(mut self, offset: usize) -> SearchOptions {
        self.offset = offset;
        self
    }

    /// Order by a fast field.
    pub fn order_by<S: Into<String>>(mut self, field: S, order: Order) -> SearchOptions {
        self.order_by = Some((field.into(), order));
        self
    }
}

/// One ranked hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// BM25 (or constant) score; for fast-field ordered searches this is
    /// still the query score, not the ordering key.
    pub score: f32,
    /// Where to fetch the document.
    pub address: DocAddress,
}

/// The outcome of one search.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Top hits after offset and limit.
    pub hits: Vec<Hit>,
    /// Total number of matching documents across all segments.
    pub count: usize,
}

// Min-heap entry: the WORST kept hit sits on top so it can be evicted.
// Ordering is the inverse of presentation order (score desc, segment asc,
// doc asc).
struct HeapEntry {
    score: f32,
    segment_ord: u32,
    doc_id: DocId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the weakest hit is the root.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.segment_ord.cmp(&other.segment_ord))
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// A point-in-time view of the index for query execution.
pub struct Searcher {
    generation: u64,
    schema: Schema,
    registry: Arc<AnalyzerRegistry>,
    segments: Vec<Arc<SegmentReader>>,
    stats: CorpusStats,
}

impl Searcher {
    /// Build a searcher over a snapshot of segments.
    pub fn new(
        generation: u64,
        schema: Schema,
        registry: Arc<AnalyzerRegistry>,
        segments: Vec<Arc<SegmentReader>>,
    ) -> Searcher {
        let stats = CorpusStats::from_segments(&segments);
        Searcher {
            generation,
            schema,
            registry,
            segments,
            stats,
        }
    }

    /// Monotonic reload generation this snapshot came from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The index schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The segment snapshot.
    pub fn segment_readers(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    /// Number of live documents visible to this snapshot.
    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_alive() as u64).sum()
    }

    fn context(&self) -> EvalContext<'_> {
        EvalContext {
            schema: &self.schema,
            registry: &self.registry,
            stats: &self.stats,
            segments: &self.segments,
        }
    }

    /// Score-ordered search with default options.
    pub fn search(&self, query: &Query, limit: usize) -> Result<SearchResults> {
        self.search_with(query, &SearchOptions::top(limit))
    }

    /// Search with explicit offset and ordering options.
    pub fn search_with(&self, query: &Query, options: &SearchOptions) -> Result<SearchResults> {
        let ctx = self.context();
        let per_segment: Vec<Result<Vec<(DocId, f32)>>> = self
            .segments
            .par_iter()
            .map(|segment| eval_segment(&ctx, segment, query))
            .collect();
        let mut segment_hits = Vec::with_capacity(per_segment.len());
        for result in per_segment {
            segment_hits.push(result?);
        }
        let count: usize = segment_hits.iter().map(|hits| hits.len()).sum();

        let hits = match &options.order_by {
            None => self.merge_by_score(segment_hits, options),
            Some((field_name, order)) => {
                self.merge_by_field(segment_hits, field_name, *order, options)?
            }
        };
        Ok(SearchResults { hits, count })
    }

    fn merge_by_score(
        &self,
        segment_hits: Vec<Vec<(DocId, f32)>>,
        options: &SearchOptions,
    ) -> Vec<Hit> {
        let keep = options.limit + options.offset;
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(keep + 1);
        for (segment_ord, hits) in segment_hits.into_iter().enumerate() {
            for (doc_id, score) in hits {
                heap.push(HeapEntry {
                    score,
                    segment_ord: segment_ord as u32,
                    doc_id,
                });
                if heap.len() > keep {
                    heap.pop();
                }
            }
        }
        let mut ordered: Vec<HeapEntry> = heap.into_vec();
        ordered.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.segment_ord.cmp(&b.segment_ord))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        ordered
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .map(|entry| Hit {
                score: entry.score,
                address: DocAddress::new(entry.segment_ord, entry.doc_id),
            })
            .collect()
    }

    fn merge_by_field(
        &self,
        segment_hits: Vec<Vec<(DocId, f32)>>,
        field_name: &str,
        order: Order,
        options: &SearchOptions,
    ) -> Result<Vec<Hit>> {
        let field = self.schema.get_field(field_name)?;
        let entry = self.schema.get_field_entry(field);
        if !entry.options.fast {
            return Err(FathomError::config(format!(
                "Field `{field_name}` is not a fast field; ordering requires one"
            )));
        }

        // ordering key: (has value, value) so value-less docs sort last
        let mut keyed: Vec<(Option<u128>, f32, DocAddress)> = Vec::new();
        for (segment_ord, hits) in segment_hits.into_iter().enumerate() {
            let segment = &self.segments[segment_ord];
            let column = segment.fast_fields().column(field);
            for (doc_id, score) in hits {
                let key = column.and_then(|c| c.get_u128(doc_id));
                keyed.push((key, score, DocAddress::new(segment_ord as u32, doc_id)));
            }
        }
        keyed.sort_by(|a, b| {
            let primary = match (a.0, b.0) {
                (Some(x), Some(y)) => match order {
                    Order::Asc => x.cmp(&y),
                    Order::Desc => y.cmp(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            primary
                .then_with(|| a.2.segment_ord.cmp(&b.2.segment_ord))
                .then_with(|| a.2.doc_id.cmp(&b.2.doc_id))
        });
        Ok(keyed
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .map(|(_, score, address)| Hit { score, address })
            .collect())
    }

    /// Fetch the stored fields behind a hit. A stale address (from another
    /// snapshot) surfaces as [`FathomError::Stale`].
    pub fn doc(&self, address: DocAddress) -> Result<Document> {
        let segment = self
            .segments
            .get(address.segment_ord as usize)
            .ok_or_else(|| {
                FathomError::stale(format!(
                    "Segment ordinal {} is not part of this snapshot",
                    address.segment_ord
                ))
            })?;
        if address.doc_id >= segment.max_doc() {
            return Err(FathomError::stale(format!(
                "Doc id {} is out of bounds for segment {}",
                address.doc_id,
                address.segment_ord
            )));
        }
        segment.doc(address.doc_id)
    }

    /// Exact document frequency of a term, summed across the snapshot.
    pub fn doc_freq(&self, term: &Term) -> u64 {
        self.stats.doc_freq(&self.segments, term)
    }

    /// Count live documents per immediate child of `parent` in a facet
    /// field.
    pub fn facet_counts(&self, field_name: &str, parent: &Facet) -> Result<FacetCounts> {
        let field = self.schema.get_field(field_name)?;
        let entry = self.schema.get_field_entry(field);
        if entry.field_type != FieldType::Facet {
            return Err(FathomError::config(format!(
                "Field `{field_name}` is not a facet field"
            )));
        }
        count_facets(&self.segments, field, parent)
    }

    /// Explain a hit's score.
    pub fn explain(&self, query: &Query, address: DocAddress) -> Result<Explanation> {
        let segment = self
            .segments
            .get(address.segment_ord as usize)
            .ok_or_else(|| {
                FathomError::stale(format!(
                    "Segment ordinal {} is not part of this snapshot",
                    address.segment_ord
                ))
            })?;
        explain_segment(&self.context(), segment, query, address.doc_id)
    }
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("generation", &self.generation)
            .field("segments", &self.segments.len())
            .field("num_docs", &self.num_docs())
            .finish()
    }
}
