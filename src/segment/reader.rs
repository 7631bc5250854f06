//! Read access to one sealed segment.

use crate::error::Result;
use crate::postings::{DocId, PostingList};
use crate::schema::{Document, Field, Schema, Term};
use crate::segment::deletes::DeleteSet;
use crate::segment::fastfield::FastFieldReaders;
use crate::segment::store::StoreReader;
use crate::segment::term_dict::{TermDictionary, TermInfo};
use crate::segment::SegmentMeta;
use crate::storage::{read_all, Storage, StructReader};

/// A reader over one segment's files.
///
/// Everything a `SegmentReader` exposes is immutable: the deletion bitmap
/// is loaded once at open time, so a reader is a consistent point-in-time
/// view even while the writer keeps committing.
pub struct SegmentReader {
    meta: SegmentMeta,
    schema: Schema,
    term_dict: TermDictionary,
    postings_data: StructReader,
    store: StoreReader,
    fast: FastFieldReaders,
    deletes: DeleteSet,
}

impl SegmentReader {
    /// Open all files of a segment.
    pub fn open(storage: &dyn Storage, meta: &SegmentMeta, schema: Schema) -> Result<SegmentReader> {
        let mut dict_reader = StructReader::open(read_all(storage, &meta.term_file())?)?;
        let term_dict = TermDictionary::open(&mut dict_reader)?;

        let postings_data = StructReader::open(read_all(storage, &meta.postings_file())?)?;
        let store = StoreReader::open(StructReader::open(read_all(storage, &meta.store_file())?)?)?;

        let mut fast_reader = StructReader::open(read_all(storage, &meta.fast_file())?)?;
        let fast = FastFieldReaders::open(&mut fast_reader)?;

        let deletes_file = meta.deletes_file();
        let deletes = if storage.file_exists(&deletes_file) {
            DeleteSet::from_bytes(&read_all(storage, &deletes_file)?, meta.max_doc)?
        } else {
            DeleteSet::new(meta.max_doc)
        };

        Ok(SegmentReader {
            meta: SegmentMeta {
                num_deleted: deletes.num_deleted(),
                ..*meta
            },
            schema,
            term_dict,
            postings_data,
            store,
            fast,
            deletes,
        })
    }

    /// The segment's metadata, with the live deletion count.
    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    /// The schema this segment was written under.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of documents, deleted ones included.
    pub fn max_doc(&self) -> u32 {
        self.meta.max_doc
    }

    /// Number of live documents.
    pub fn num_alive(&self) -> u32 {
        self.meta.max_doc - self.deletes.num_deleted()
    }

    /// True if the document has not been deleted.
    pub fn is_alive(&self, doc_id: DocId) -> bool {
        doc_id < self.meta.max_doc && !self.deletes.is_deleted(doc_id)
    }

    /// The deletion bitmap as loaded at open time.
    pub fn deletes(&self) -> &DeleteSet {
        &self.deletes
    }

    /// The term dictionary, for range and prefix scans.
    pub fn term_dict(&self) -> &TermDictionary {
        &self.term_dict
    }

    /// Dictionary info of one term, if present in this segment.
    pub fn term_info(&self, term: &Term) -> Option<TermInfo> {
        self.term_dict.get(term.as_bytes())
    }

    /// Number of documents containing the term (deleted docs included;
    /// doc frequency is a property of the sealed postings).
    pub fn doc_freq(&self, term: &Term) -> u32 {
        self.term_info(term).map(|info| info.doc_freq).unwrap_or(0)
    }

    /// Decode the posting list behind a dictionary entry.
    pub fn postings_for_info(&self, info: &TermInfo) -> Result<PostingList> {
        let mut reader = self.postings_data.fork(info.posting_offset as usize)?;
        PostingList::decode(&mut reader)
    }

    /// Decode the posting list of one term.
    pub fn postings(&self, term: &Term) -> Result<Option<PostingList>> {
        match self.term_info(term) {
            Some(info) => Ok(Some(self.postings_for_info(&info)?)),
            None => Ok(None),
        }
    }

    /// Fetch the stored fields of one document.
    pub fn doc(&self, doc_id: DocId) -> Result<Document> {
        self.store.get(doc_id)
    }

    /// The columnar fast fields and text lengths.
    pub fn fast_fields(&self) -> &FastFieldReaders {
        &self.fast
    }

    /// Token count of a text field in one document.
    pub fn field_length(&self, field: Field, doc_id: DocId) -> u32 {
        self.fast.lengths().length(field, doc_id)
    }

    /// Total token count of a text field across the segment.
    pub fn total_field_length(&self, field: Field) -> u64 {
        self.fast.lengths().total_length(field)
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("id", &self.meta.id)
            .field("max_doc", &self.meta.max_doc)
            .field("num_deleted", &self.meta.num_deleted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::registry::AnalyzerRegistry;
    use crate::schema::FieldOptions;
    use crate::segment::writer::SegmentWriter;
    use crate::storage::memory::MemoryStorage;

    fn indexed_segment() -> (MemoryStorage, Schema, Field, SegmentMeta) {
        let mut builder = Schema::builder();
        let body = builder.add_text_field("body", FieldOptions::default());
        let schema = builder.build().unwrap();
        let storage = MemoryStorage::new();
        let mut writer = SegmentWriter::new(schema.clone(), Arc::new(AnalyzerRegistry::new()));
        for text in ["old man", "young man", "old sea"] {
            let mut doc = Document::new();
            doc.add_text(body, text);
            writer.add_document(&doc).unwrap();
        }
        let meta = writer.flush(&storage).unwrap();
        (storage, schema, body, meta)
    }

    #[test]
    fn test_doc_freq_and_lengths() {
        let (storage, schema, body, meta) = indexed_segment();
        let reader = SegmentReader::open(&storage, &meta, schema).unwrap();
        assert_eq!(reader.doc_freq(&Term::from_field_text(body, "man")), 2);
        assert_eq!(reader.doc_freq(&Term::from_field_text(body, "old")), 2);
        assert_eq!(reader.doc_freq(&Term::from_field_text(body, "gone")), 0);
        assert_eq!(reader.field_length(body, 0), 2);
        assert_eq!(reader.total_field_length(body), 6);
    }

    #[test]
    fn test_deletes_loaded_from_bitmap() {
        let (storage, schema, _, meta) = indexed_segment();
        let mut set = DeleteSet::new(meta.max_doc);
        set.delete(1);
        storage
            .atomic_write(&meta.deletes_file(), &set.to_bytes())
            .unwrap();

        let reader = SegmentReader::open(&storage, &meta, schema).unwrap();
        assert!(reader.is_alive(0));
        assert!(!reader.is_alive(1));
        assert_eq!(reader.num_alive(), 2);
        assert_eq!(reader.meta().num_deleted, 1);
    }

    #[test]
    fn test_out_of_bounds_doc_not_alive() {
        let (storage, schema, _, meta) = indexed_segment();
        let reader = SegmentReader::open(&storage, &meta, schema).unwrap();
        assert!(!reader.is_alive(99));
        assert!(reader.doc(99).is_err());
    }
}
