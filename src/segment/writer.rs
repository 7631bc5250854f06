//! The segment writer: buffers documents and seals them into segment files.
//!
//! Documents get dense doc ids in arrival order. Text fields run through
//! the analyzer named in their options (or the index default), numeric and
//! other exact fields produce a single term each, and JSON fields are
//! flattened to their scalar leaves. Nothing touches storage until
//! [`SegmentWriter::flush`], which writes the postings, term dictionary,
//! store, and fast field files and returns the sealed segment's metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::registry::{AnalyzerRegistry, DEFAULT_ANALYZER_NAME};
use crate::analysis::TextAnalyzer;
use crate::error::{FathomError, Result};
use crate::postings::{DocId, PostingList, PostingListBuilder};
use crate::schema::term::{date_to_i64, f64_to_u64, i64_to_u64, ip_to_u128};
use crate::schema::{Document, FieldEntry, FieldType, Schema, Term, Value};
use crate::segment::fastfield::{FastColumnBuilder, write_fast_fields};
use crate::segment::store::StoreWriter;
use crate::segment::term_dict::{TermDictionaryBuilder, TermInfo};
use crate::segment::{SegmentId, SegmentMeta};
use crate::schema::Field;
use crate::storage::{Storage, StructWriter};

/// Position gap inserted between repeated values of one text field, so
/// phrases never match across value boundaries.
const POSITION_GAP: u32 = 2;

/// Buffers documents for one future segment.
pub struct SegmentWriter {
    schema: Schema,
    registry: Arc<AnalyzerRegistry>,
    postings: BTreeMap<Vec<u8>, PostingListBuilder>,
    stored_docs: Vec<Document>,
    fast: AHashMap<u32, FastColumnBuilder>,
    lengths: AHashMap<u32, Vec<u32>>,
    max_doc: DocId,
}

impl SegmentWriter {
    /// Create an empty writer for the given schema.
    pub fn new(schema: Schema, registry: Arc<AnalyzerRegistry>) -> SegmentWriter {
        SegmentWriter {
            schema,
            registry,
            postings: BTreeMap::new(),
            stored_docs: Vec::new(),
            fast: AHashMap::new(),
            lengths: AHashMap::new(),
            max_doc: 0,
        }
    }

    /// Number of documents buffered so far.
    pub fn num_docs(&self) -> u32 {
        self.max_doc
    }

    /// True if no document has been added.
    pub fn is_empty(&self) -> bool {
        self.max_doc == 0
    }

    fn analyzer_for(&self, entry: &FieldEntry) -> Result<TextAnalyzer> {
        let name = entry
            .options
            .tokenizer
            .as_deref()
            .unwrap_or(DEFAULT_ANALYZER_NAME);
        self.registry.get(name).ok_or_else(|| {
            FathomError::config(format!(
                "Field `{}` uses analyzer `{name}`, which is not registered",
                entry.name
            ))
        })
    }

    fn add_term(&mut self, term: Term, doc_id: DocId, position: Option<u32>) -> Result<()> {
        self.postings
            .entry(term.as_bytes().to_vec())
            .or_default()
            .add_occurrence(doc_id, position)
    }

    fn record_fast(&mut self, field: Field, field_type: FieldType, doc_id: DocId, value: &Value) {
        let builder = self.fast.entry(field.0).or_insert_with(|| {
            if field_type == FieldType::Ip {
                FastColumnBuilder::new_u128()
            } else {
                FastColumnBuilder::new_u64()
            }
        });
        match value {
            Value::U64(v) => builder.record_u64(doc_id, *v),
            Value::I64(v) => builder.record_u64(doc_id, i64_to_u64(*v)),
            Value::F64(v) => builder.record_u64(doc_id, f64_to_u64(*v)),
            Value::Bool(v) => builder.record_u64(doc_id, *v as u64),
            Value::Date(v) => builder.record_u64(doc_id, i64_to_u64(date_to_i64(*v))),
            Value::Ip(addr) => builder.record_u128(doc_id, ip_to_u128(*addr)),
            _ => {}
        }
    }

    fn index_text(
        &mut self,
        field: Field,
        entry: &FieldEntry,
        doc_id: DocId,
        text: &str,
        next_position: &mut u32,
    ) -> Result<()> {
        let analyzer = self.analyzer_for(entry)?;
        let tokens = analyzer.analyze(text);
        let base = *next_position;
        let mut last = base;
        for token in &tokens {
            let position = base + token.position;
            self.add_term(Term::from_field_text(field, &token.text), doc_id, Some(position))?;
            last = position;
        }
        if !tokens.is_empty() {
            *next_position = last + POSITION_GAP;
        }
        let lengths = self.lengths.entry(field.0).or_default();
        lengths.resize(doc_id as usize + 1, 0);
        lengths[doc_id as usize] += tokens.len() as u32;
        Ok(())
    }

    fn index_json(
        &mut self,
        field: Field,
        entry: &FieldEntry,
        doc_id: DocId,
        json: &serde_json::Value,
        next_position: &mut u32,
    ) -> Result<()> {
        match json {
            serde_json::Value::Null => Ok(()),
            serde_json::Value::String(text) => {
                let analyzer = self.analyzer_for(entry)?;
                let tokens = analyzer.analyze(text);
                let base = *next_position;
                let mut last = base;
                let mut count = 0u32;
                for token in &tokens {
                    let position = base + token.position;
                    self.add_term(
                        Term::from_field_json_text(field, &token.text),
                        doc_id,
                        Some(position),
                    )?;
                    last = position;
                    count += 1;
                }
                if count > 0 {
                    *next_position = last + POSITION_GAP;
                }
                let lengths = self.lengths.entry(field.0).or_default();
                lengths.resize(doc_id as usize + 1, 0);
                lengths[doc_id as usize] += count;
                Ok(())
            }
            serde_json::Value::Bool(_)
            | serde_json::Value::Number(_) => {
                let token = json.to_string();
                let position = *next_position;
                self.add_term(
                    Term::from_field_json_text(field, &token),
                    doc_id,
                    Some(position),
                )?;
                *next_position = position + POSITION_GAP;
                let lengths = self.lengths.entry(field.0).or_default();
                lengths.resize(doc_id as usize + 1, 0);
                lengths[doc_id as usize] += 1;
                Ok(())
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.index_json(field, entry, doc_id, item, next_position)?;
                }
                Ok(())
            }
            serde_json::Value::Object(map) => {
                for item in map.values() {
                    self.index_json(field, entry, doc_id, item, next_position)?;
                }
                Ok(())
            }
        }
    }

    /// Buffer one document, assigning it the next dense doc id.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let doc_id = self.max_doc;
        // Running position per field, so repeated values of one field keep
        // distinct, gapped positions.
        let mut positions: AHashMap<u32, u32> = AHashMap::new();

        for fv in doc.field_values() {
            let entry = self.schema.get_field_entry(fv.field).clone();
            if !entry.field_type.accepts(&fv.value) {
                return Err(FathomError::schema(format!(
                    "Field `{}` expects a {} value",
                    entry.name,
                    entry.field_type.name()
                )));
            }
            if entry.options.indexed {
                let next_position = positions.entry(fv.field.0).or_insert(0);
                match (&entry.field_type, &fv.value) {
                    (FieldType::Text, Value::Str(text)) => {
                        self.index_text(fv.field, &entry, doc_id, text, next_position)?;
                    }
                    (FieldType::Json, json_value) => {
                        let json = match json_value {
                            Value::Json(json) => json.clone(),
                            other => serde_json::to_value(other)?,
                        };
                        self.index_json(fv.field, &entry, doc_id, &json, next_position)?;
                    }
                    (FieldType::U64, Value::U64(v)) => {
                        self.add_term(Term::from_field_u64(fv.field, *v), doc_id, None)?;
                    }
                    (FieldType::I64, Value::I64(v)) => {
                        self.add_term(Term::from_field_i64(fv.field, *v), doc_id, None)?;
                    }
                    (FieldType::F64, Value::F64(v)) => {
                        self.add_term(Term::from_field_f64(fv.field, *v), doc_id, None)?;
                    }
                    (FieldType::Bool, Value::Bool(v)) => {
                        self.add_term(Term::from_field_bool(fv.field, *v), doc_id, None)?;
                    }
                    (FieldType::Date, Value::Date(v)) => {
                        self.add_term(Term::from_field_date(fv.field, *v), doc_id, None)?;
                    }
                    (FieldType::Facet, Value::Facet(facet)) => {
                        self.add_term(Term::from_field_facet(fv.field, facet), doc_id, None)?;
                    }
                    (FieldType::Bytes, Value::Bytes(bytes)) => {
                        self.add_term(Term::from_field_bytes(fv.field, bytes), doc_id, None)?;
                    }
                    (FieldType::Ip, Value::Ip(addr)) => {
                        self.add_term(Term::from_field_ip(fv.field, *addr), doc_id, None)?;
                    }
                    _ => {
                        return Err(FathomError::schema(format!(
                            "Field `{}` expects a {} value",
                            entry.name,
                            entry.field_type.name()
                        )));
                    }
                }
            }
            if entry.options.fast {
                self.record_fast(fv.field, entry.field_type, doc_id, &fv.value);
            }
        }

        self.stored_docs.push(doc.clone());
        self.max_doc += 1;
        Ok(doc_id)
    }

    /// Seal the buffered documents into a fresh segment.
    pub fn flush(self, storage: &dyn Storage) -> Result<SegmentMeta> {
        let postings = self
            .postings
            .into_iter()
            .map(|(bytes, builder)| (bytes, builder.build()))
            .collect();
        write_segment(
            storage,
            SegmentId::generate(),
            &self.schema,
            self.max_doc,
            postings,
            &self.stored_docs,
            self.fast,
            self.lengths,
        )
    }
}

/// Write all files of one segment. Shared by the segment writer and the
/// merger, which both arrive here with fully materialized postings.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_segment(
    storage: &dyn Storage,
    id: SegmentId,
    schema: &Schema,
    max_doc: u32,
    postings: BTreeMap<Vec<u8>, PostingList>,
    stored_docs: &[Document],
    fast: AHashMap<u32, FastColumnBuilder>,
    lengths: AHashMap<u32, Vec<u32>>,
    ) -> Result<SegmentMeta> {
    let meta = SegmentMeta {
        id,
        max_doc,
        num_deleted: 0,
    };

    // Postings and term dictionary. The BTreeMap iterates terms in the
    // ascending byte order the fst builder requires.
    let mut post_writer = StructWriter::new(storage.create_output(&meta.postings_file())?);
    let mut dict_builder = TermDictionaryBuilder::new();
    for (term_bytes, list) in &postings {
        let info = TermInfo {
            posting_offset: post_writer.position(),
            doc_freq: list.doc_freq(),
            total_term_freq: list.total_term_freq,
        };
        list.encode(&mut post_writer)?;
        dict_builder.insert(term_bytes, info)?;
    }
    post_writer.close()?;

    let mut dict_writer = StructWriter::new(storage.create_output(&meta.term_file())?);
    dict_builder.write(&mut dict_writer)?;
    dict_writer.close()?;

    // Stored documents.
    let out = StructWriter::new(storage.create_output(&meta.store_file())?);
    let mut store_writer = StoreWriter::new(out, schema.clone());
    for doc in stored_docs {
        store_writer.store(doc)?;
    }
    store_writer.close()?;

    // Fast fields and text lengths.
    let mut fast_writer = StructWriter::new(storage.create_output(&meta.fast_file())?);
    let mut columns: Vec<_> = fast
        .into_iter()
        .map(|(ord, builder)| (Field(ord), builder))
        .collect();
    columns.sort_by_key(|(field, _)| field.0);
    let mut length_fields: Vec<_> = lengths
        .into_iter()
        .map(|(ord, lens)| (Field(ord), lens))
        .collect();
    length_fields.sort_by_key(|(field, _)| field.0);
    write_fast_fields(&mut fast_writer, max_doc, columns, length_fields)?;
    fast_writer.close()?;

    Ok(meta)
}
