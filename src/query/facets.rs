//! Facet counting.
//!
//! Counts live documents per immediate child of a parent facet path. The
//! encoding makes every descendant of `/a` share the byte prefix of `/a`,
//! so counting is one ordered scan of each segment's term dictionary.

use std::collections::BTreeMap;
use std::sync::Arc;

use bit_vec::BitVec;

use crate::error::Result;
use crate::schema::facet::Facet;
use crate::schema::term::{Term, TypeCode};
use crate::schema::Field;
use crate::segment::SegmentReader;

/// Per-child document counts under one parent facet.
#[derive(Debug, Clone, Default)]
pub struct FacetCounts {
    counts: BTreeMap<Vec<u8>, u64>,
}

impl FacetCounts {
    /// Count for one exact child path. Zero if absent.
    pub fn get(&self, facet: &Facet) -> u64 {
        self.counts
            .get(facet.encoded_bytes())
            .copied()
            .unwrap_or(0)
    }

    /// All children in path order.
    pub fn iter(&self) -> impl Iterator<Item = (Facet, u64)> + '_ {
        self.counts.iter().filter_map(|(encoded, &count)| {
            Facet::from_encoded(encoded).ok().map(|facet| (facet, count))
        })
    }

    /// The `k` most frequent children, largest first, ties in path order.
    pub fn top(&self, k: usize) -> Vec<(Facet, u64)> {
        let mut all: Vec<(Facet, u64)> = self.iter().collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(k);
        all
    }
}

/// Count live documents per immediate child of `parent` in `field`,
/// across all segments.
///
/// A document carrying several facets under the same child is counted
/// once for that child; one carrying facets under different children is
/// counted once per child.
pub fn count_facets(
    segments: &[Arc<SegmentReader>],
    field: Field,
    parent: &Facet,
) -> Result<FacetCounts> {
    let prefix_len = Term::field_prefix(field, TypeCode::Facet).len();
    let parent_len = parent.encoded_bytes().len();
    let scan_prefix = {
        let mut bytes = Term::field_prefix(field, TypeCode::Facet);
        bytes.extend_from_slice(parent.encoded_bytes());
        bytes
    };

    let mut counts: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
    for segment in segments {
        // child encoded path -> docs already counted for it
        let mut seen: BTreeMap<Vec<u8>, BitVec> = BTreeMap::new();
        for (term_bytes, info) in segment.term_dict().prefix(&scan_prefix) {
            let value = &term_bytes[prefix_len..];
            let Some(step_end) = value[parent_len..].iter().position(|&b| b == 0) else {
                continue;
            };
            let child = value[..parent_len + step_end + 1].to_vec();
            let seen_docs = seen
                .entry(child)
                .or_insert_with(|| BitVec::from_elem(segment.max_doc() as usize, false));
            let list = segment.postings_for_info(&info)?;
            for posting in &list.postings {
                if segment.is_alive(posting.doc_id) {
                    seen_docs.set(posting.doc_id as usize, true);
                }
            }
        }
        for (child, seen_docs) in seen {
            let n = seen_docs.iter().filter(|&b| b).count() as u64;
            if n > 0 {
                *counts.entry(child).or_insert(0) += n;
            }
        }
    }
    Ok(FacetCounts { counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::AnalyzerRegistry;
    use crate::schema::{Document, FieldOptions, Schema};
    use crate::segment::SegmentWriter;
    use crate::storage::MemoryStorage;

    fn facet_segment(paths: &[&[&str]]) -> (Vec<Arc<SegmentReader>>, Field) {
        let mut builder = Schema::builder();
        let category = builder.add_facet_field("category", FieldOptions::default());
        let schema = builder.build().unwrap();
        let storage = MemoryStorage::new();
        let mut writer = SegmentWriter::new(schema.clone(), Arc::new(AnalyzerRegistry::new()));
        for doc_paths in paths {
            let mut doc = Document::new();
            for path in *doc_paths {
                doc.add_facet(category, Facet::from_text(path).unwrap());
            }
            writer.add_document(&doc).unwrap();
        }
        let meta = writer.flush(&storage).unwrap();
        let reader = Arc::new(SegmentReader::open(&storage, &meta, schema).unwrap());
        (vec![reader], category)
    }

    #[test]
    fn test_counts_group_by_immediate_child() {
        let (segments, category) = facet_segment(&[
            &["/lang/rust"],
            &["/lang/rust/async"],
            &["/lang/go"],
            &["/topic/search"],
        ]);
        let counts =
            count_facets(&segments, category, &Facet::from_text("/lang").unwrap()).unwrap();
        assert_eq!(counts.get(&Facet::from_text("/lang/rust").unwrap()), 2);
        assert_eq!(counts.get(&Facet::from_text("/lang/go").unwrap()), 1);
        assert_eq!(counts.get(&Facet::from_text("/topic/search").unwrap()), 0);
    }

    #[test]
    fn test_doc_counted_once_per_child() {
        let (segments, category) = facet_segment(&[&["/lang/rust", "/lang/rust/async", "/lang/go"]]);
        let counts = count_facets(&segments, category, &Facet::root()).unwrap();
        assert_eq!(counts.get(&Facet::from_text("/lang").unwrap()), 1);

        let under_lang =
            count_facets(&segments, category, &Facet::from_text("/lang").unwrap()).unwrap();
        assert_eq!(under_lang.get(&Facet::from_text("/lang/rust").unwrap()), 1);
        assert_eq!(under_lang.get(&Facet::from_text("/lang/go").unwrap()), 1);
    }

    #[test]
    fn test_top_orders_by_count() {
        let (segments, category) = facet_segment(&[
            &["/t/a"],
            &["/t/b"],
            &["/t/b"],
        ]);
        let counts = count_facets(&segments, category, &Facet::from_text("/t").unwrap()).unwrap();
        let top = counts.top(2);
        assert_eq!(top[0].0.to_path_string(), "/t/b");
        assert_eq!(top[0].1, 2);
        assert_eq!(top[1].0.to_path_string(), "/t/a");
    }
}
