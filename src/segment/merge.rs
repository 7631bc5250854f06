//! Segment merging.
//!
//! Merging folds several sealed segments into one fresh segment, dropping
//! deleted documents and renumbering the survivors densely in segment
//! order. The inputs are never modified; the caller swaps the manifest to
//! the merged segment and retires the inputs afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::Result;
use crate::postings::{DocId, PostingList};
use crate::schema::{Document, FieldType, Schema};
use crate::segment::fastfield::FastColumnBuilder;
use crate::segment::reader::SegmentReader;
use crate::segment::writer::write_segment;
use crate::segment::{SegmentId, SegmentMeta};
use crate::storage::Storage;

/// Merge `readers` into one new segment and return its metadata.
pub fn merge_segments(
    storage: &dyn Storage,
    schema: &Schema,
    readers: &[Arc<SegmentReader>],
) -> Result<SegmentMeta> {
    // Dense renumbering: per input segment, old doc id -> new doc id for the
    // survivors, None for deleted docs.
    let mut mappings: Vec<Vec<Option<DocId>>> = Vec::with_capacity(readers.len());
    let mut next_id: DocId = 0;
    for reader in readers {
        let mut mapping = Vec::with_capacity(reader.max_doc() as usize);
        for old_id in 0..reader.max_doc() {
            if reader.is_alive(old_id) {
                mapping.push(Some(next_id));
                next_id += 1;
            } else {
                mapping.push(None);
            }
        }
        mappings.push(mapping);
    }
    let max_doc = next_id;

    // Postings: walk every input dictionary in segment order. Remapped doc
    // ids are ascending within each term because inputs are processed in
    // the same order the new ids were assigned.
    let mut postings: BTreeMap<Vec<u8>, PostingList> = BTreeMap::new();
    for (seg_ord, reader) in readers.iter().enumerate() {
        let mapping = &mappings[seg_ord];
        for (term_bytes, info) in reader.term_dict().all() {
            let list = reader.postings_for_info(&info)?;
            let merged = postings.entry(term_bytes).or_default();
            for posting in list.postings {
                if let Some(new_id) = mapping[posting.doc_id as usize] {
                    merged.total_term_freq += posting.term_freq as u64;
                    merged.postings.push(crate::postings::Posting {
                        doc_id: new_id,
                        term_freq: posting.term_freq,
                        positions: posting.positions,
                    });
                }
            }
        }
    }
    // Terms whose every posting was deleted leave an empty list behind.
    postings.retain(|_, list| !list.postings.is_empty());

    // Stored documents, in new doc id order.
    let mut stored_docs: Vec<Document> = Vec::with_capacity(max_doc as usize);
    for (seg_ord, reader) in readers.iter().enumerate() {
        for old_id in 0..reader.max_doc() {
            if mappings[seg_ord][old_id as usize].is_some() {
                stored_docs.push(reader.doc(old_id)?);
            }
        }
    }

    // Fast columns and text lengths.
    let mut fast: AHashMap<u32, FastColumnBuilder> = AHashMap::new();
    let mut lengths: AHashMap<u32, Vec<u32>> = AHashMap::new();
    for (field, entry) in schema.fields() {
        if entry.options.fast {
            let builder = if entry.field_type == FieldType::Ip {
                FastColumnBuilder::new_u128()
            } else {
                FastColumnBuilder::new_u64()
            };
            fast.insert(field.0, builder);
        }
    }
    for (seg_ord, reader) in readers.iter().enumerate() {
        for old_id in 0..reader.max_doc() {
            let Some(new_id) = mappings[seg_ord][old_id as usize] else {
                continue;
            };
            for (field, entry) in schema.fields() {
                if entry.options.fast {
                    if let Some(column) = reader.fast_fields().column(field) {
                        if entry.field_type == FieldType::Ip {
                            if let Some(value) = column.get_u128(old_id) {
                                if let Some(builder) = fast.get_mut(&field.0) {
                                    builder.record_u128(new_id, value);
                                }
                            }
                        } else if let Some(value) = column.get_u64(old_id) {
                            if let Some(builder) = fast.get_mut(&field.0) {
                                builder.record_u64(new_id, value);
                            }
                        }
                    }
                }
                if entry.options.indexed
                    && matches!(entry.field_type, FieldType::Text | FieldType::Json)
                {
                    let len = reader.field_length(field, old_id);
                    if len > 0 {
                        let lens = lengths.entry(field.0).or_default();
                        lens.resize(new_id as usize + 1, 0);
                        lens[new_id as usize] = len;
                    }
                }
            }
        }
    }

    write_segment(
        storage,
        SegmentId::generate(),
        schema,
        max_doc,
        postings,
        &stored_docs,
        fast,
        lengths,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::AnalyzerRegistry;
    use crate::schema::{Field, FieldOptions, Term};
    use crate::segment::deletes::DeleteSet;
    use crate::segment::writer::SegmentWriter;
    use crate::storage::memory::MemoryStorage;

    fn schema() -> (Schema, Field, Field) {
        let mut builder = Schema::builder();
        let body = builder.add_text_field("body", FieldOptions::default());
        let year = builder.add_u64_field("year", FieldOptions::default().fast());
        (builder.build().unwrap(), body, year)
    }

    fn write_one(
        storage: &MemoryStorage,
        schema: &Schema,
        body: Field,
        year: Field,
        docs: &[(&str, u64)],
    ) -> SegmentMeta {
        let mut writer = SegmentWriter::new(schema.clone(), Arc::new(AnalyzerRegistry::new()));
        for (text, y) in docs {
            let mut doc = Document::new();
            doc.add_text(body, *text);
            doc.add_u64(year, *y);
            writer.add_document(&doc).unwrap();
        }
        writer.flush(storage).unwrap()
    }

    #[test]
    fn test_merge_combines_and_renumbers() {
        let (schema, body, year) = schema();
        let storage = MemoryStorage::new();
        let first = write_one(&storage, &schema, body, year, &[("old man", 1952)]);
        let second = write_one(
            &storage,
            &schema,
            body,
            year,
            &[("mice and men", 1937), ("old sea", 1951)],
        );

        let readers = vec![
            Arc::new(SegmentReader::open(&storage, &first, schema.clone()).unwrap()),
            Arc::new(SegmentReader::open(&storage, &second, schema.clone()).unwrap()),
        ];
        let merged_meta = merge_segments(&storage, &schema, &readers).unwrap();
        assert_eq!(merged_meta.max_doc, 3);
        assert_eq!(merged_meta.num_deleted, 0);

        let merged = SegmentReader::open(&storage, &merged_meta, schema).unwrap();
        let old = merged
            .postings(&Term::from_field_text(body, "old"))
            .unwrap()
            .unwrap();
        // doc 0 from the first segment, doc 2 from the second.
        let ids: Vec<_> = old.postings.iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 2]);

        let column = merged.fast_fields().column(year).unwrap();
        assert_eq!(column.get_u64(0), Some(1952));
        assert_eq!(column.get_u64(1), Some(1937));
        assert_eq!(column.get_u64(2), Some(1951));
    }

    #[test]
    fn test_merge_drops_deleted_docs() {
        let (schema, body, year) = schema();
        let storage = MemoryStorage::new();
        let meta = write_one(
            &storage,
            &schema,
            body,
            year,
            &[("first doc", 1), ("second doc", 2), ("third doc", 3)],
        );
        let mut deletes = DeleteSet::new(meta.max_doc);
        deletes.delete(1);
        storage
            .atomic_write(&meta.deletes_file(), &deletes.to_bytes())
            .unwrap();

        let readers = vec![Arc::new(
            SegmentReader::open(&storage, &meta, schema.clone()).unwrap(),
        )];
        let merged_meta = merge_segments(&storage, &schema, &readers).unwrap();
        assert_eq!(merged_meta.max_doc, 2);

        let merged = SegmentReader::open(&storage, &merged_meta, schema).unwrap();
        // "second" disappeared entirely; its term is gone from the dictionary.
        assert!(merged
            .postings(&Term::from_field_text(body, "second"))
            .unwrap()
            .is_none());
        let third = merged
            .postings(&Term::from_field_text(body, "third"))
            .unwrap()
            .unwrap();
        assert_eq!(third.postings[0].doc_id, 1);

        let column = merged.fast_fields().column(year).unwrap();
        assert_eq!(column.get_u64(0), Some(1));
        assert_eq!(column.get_u64(1), Some(3));
    }

    #[test]
    fn test_merge_is_idempotent_for_search() {
        let (schema, body, year) = schema();
        let storage = MemoryStorage::new();
        let first = write_one(&storage, &schema, body, year, &[("alpha beta", 1)]);
        let second = write_one(&storage, &schema, body, year, &[("beta gamma", 2)]);

        let readers = vec![
            Arc::new(SegmentReader::open(&storage, &first, schema.clone()).unwrap()),
            Arc::new(SegmentReader::open(&storage, &second, schema.clone()).unwrap()),
        ];
        let merged_meta = merge_segments(&storage, &schema, &readers).unwrap();
        let merged = SegmentReader::open(&storage, &merged_meta, schema).unwrap();

        let beta = Term::from_field_text(body, "beta");
        let combined: u32 = readers.iter().map(|r| r.doc_freq(&beta)).sum();
        assert_eq!(merged.doc_freq(&beta), combined);
        assert_eq!(merged.num_alive(), 2);
    }
}
