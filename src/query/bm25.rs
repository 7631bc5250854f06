//! BM25 scoring.
//!
//! Statistics are collected searcher-wide rather than per segment, so a
//! document's score does not change when segments merge.

use std::sync::Arc;

use ahash::AHashMap;

use crate::schema::{Field, Term};
use crate::segment::SegmentReader;

/// Term saturation parameter.
pub const K1: f32 = 1.2;
/// Length normalization parameter.
pub const B: f32 = 0.75;

/// Corpus-wide statistics shared by all per-segment scorers of one search.
#[derive(Debug, Default)]
pub struct CorpusStats {
    total_docs: u64,
    avg_field_lengths: AHashMap<u32, f32>,
}

impl CorpusStats {
    /// Gather statistics over a snapshot of segments.
    pub fn from_segments(segments: &[Arc<SegmentReader>]) -> CorpusStats {
        let total_docs: u64 = segments.iter().map(|s| s.num_alive() as u64).sum();
        let mut totals: AHashMap<u32, u64> = AHashMap::new();
        for segment in segments {
            for (field, entry) in segment.schema().fields() {
                if entry.options.indexed {
                    let total = segment.total_field_length(field);
                    if total > 0 {
                        *totals.entry(field.0).or_insert(0) += total;
                    }
                }
            }
        }
        let avg_field_lengths = totals
            .into_iter()
            .map(|(ord, total)| (ord, total as f32 / (total_docs.max(1)) as f32))
            .collect();
        CorpusStats {
            total_docs,
            avg_field_lengths,
        }
    }

    /// Number of live documents in the snapshot.
    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    /// Average token count of a field per document.
    pub fn avg_field_length(&self, field: Field) -> f32 {
        self.avg_field_lengths.get(&field.0).copied().unwrap_or(0.0)
    }

    /// Inverse document frequency of a term with document frequency `df`.
    pub fn idf(&self, df: u64) -> f32 {
        let n = self.total_docs as f32;
        let df = df as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Document frequency of a term, summed across segments.
    pub fn doc_freq(&self, segments: &[Arc<SegmentReader>], term: &Term) -> u64 {
        segments.iter().map(|s| s.doc_freq(term) as u64).sum()
    }
}

/// The per-term weight applied to each matching document.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Weight {
    /// Inverse document frequency component.
    pub idf: f32,
    /// Average field length used for normalization.
    pub avg_field_length: f32,
}

impl Bm25Weight {
    /// Build a weight for one term.
    pub fn new(stats: &CorpusStats, field: Field, doc_freq: u64) -> Bm25Weight {
        Bm25Weight {
            idf: stats.idf(doc_freq),
            avg_field_length: stats.avg_field_length(field),
        }
    }

    /// Score one document given its term frequency and field length.
    pub fn score(&self, term_freq: u32, field_length: u32) -> f32 {
        let tf = term_freq as f32;
        let norm = if self.avg_field_length > 0.0 {
            1.0 - B + B * field_length as f32 / self.avg_field_length
        } else {
            1.0
        };
        self.idf * (tf * (K1 + 1.0)) / (tf + K1 * norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_decreases_with_frequency() {
        let stats = CorpusStats {
            total_docs: 100,
            avg_field_lengths: AHashMap::new(),
        };
        assert!(stats.idf(1) > stats.idf(50));
        assert!(stats.idf(50) > 0.0);
    }

    #[test]
    fn test_score_increases_with_term_freq() {
        let weight = Bm25Weight {
            idf: 1.0,
            avg_field_length: 5.0,
        };
        assert!(weight.score(2, 5) > weight.score(1, 5));
        // saturation: the second occurrence adds less than the first
        let first = weight.score(1, 5) - weight.score(0, 5);
        let second = weight.score(2, 5) - weight.score(1, 5);
        assert!(second < first);
    }

    #[test]
    fn test_longer_docs_score_lower() {
        let weight = Bm25Weight {
            idf: 1.0,
            avg_field_length: 5.0,
        };
        assert!(weight.score(1, 2) > weight.score(1, 20));
    }
}
