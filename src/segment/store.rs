//! The stored document store.
//!
//! Stored field values are serialized per document, followed by a doc id
//! indexed offset table so a single document is retrievable without
//! scanning. Only fields marked `stored` in the schema are written; the
//! store preserves value order, so repeated fields come back in insertion
//! order.

use chrono::DateTime;

use crate::error::{FathomError, Result};
use crate::postings::DocId;
use crate::schema::term::{TypeCode, u128_to_ip};
use crate::schema::{Document, Schema, Value};
use crate::schema::{Facet, Field};
use crate::storage::structured::{StructReader, StructWriter};

fn write_value(writer: &mut StructWriter, value: &Value) -> Result<()> {
    match value {
        Value::Str(text) => {
            writer.write_u8(TypeCode::Text as u8)?;
            writer.write_string(text)
        }
        Value::U64(v) => {
            writer.write_u8(TypeCode::U64 as u8)?;
            writer.write_u64(*v)
        }
        Value::I64(v) => {
            writer.write_u8(TypeCode::I64 as u8)?;
            writer.write_u64(*v as u64)
        }
        Value::F64(v) => {
            writer.write_u8(TypeCode::F64 as u8)?;
            writer.write_f64(*v)
        }
        Value::Bool(v) => {
            writer.write_u8(TypeCode::Bool as u8)?;
            writer.write_u8(*v as u8)
        }
        Value::Date(v) => {
            writer.write_u8(TypeCode::Date as u8)?;
            writer.write_u64(crate::schema::term::date_to_i64(*v) as u64)
        }
        Value::Facet(facet) => {
            writer.write_u8(TypeCode::Facet as u8)?;
            writer.write_len_bytes(facet.encoded_bytes())
        }
        Value::Bytes(bytes) => {
            writer.write_u8(TypeCode::Bytes as u8)?;
            writer.write_len_bytes(bytes)
        }
        Value::Ip(addr) => {
            writer.write_u8(TypeCode::Ip as u8)?;
            writer.write_bytes(&crate::schema::term::ip_to_u128(*addr).to_be_bytes())
        }
        Value::Json(json) => {
            writer.write_u8(TypeCode::Json as u8)?;
            let text = serde_json::to_string(json)?;
            writer.write_string(&text)
        }
    }
}

fn read_value(reader: &mut StructReader) -> Result<Value> {
    let tag = reader.read_u8()?;
    let value = match tag {
        t if t == TypeCode::Text as u8 => Value::Str(reader.read_string()?),
        t if t == TypeCode::U64 as u8 => Value::U64(reader.read_u64()?),
        t if t == TypeCode::I64 as u8 => Value::I64(reader.read_u64()? as i64),
        t if t == TypeCode::F64 as u8 => Value::F64(reader.read_f64()?),
        t if t == TypeCode::Bool as u8 => Value::Bool(reader.read_u8()? != 0),
        t if t == TypeCode::Date as u8 => {
            let nanos = reader.read_u64()? as i64;
            Value::Date(DateTime::from_timestamp_nanos(nanos))
        }
        t if t == TypeCode::Facet as u8 => {
            Value::Facet(Facet::from_encoded(&reader.read_len_bytes()?)?)
        }
        t if t == TypeCode::Bytes as u8 => Value::Bytes(reader.read_len_bytes()?),
        t if t == TypeCode::Ip as u8 => {
            let bytes = reader.read_bytes(16)?;
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&bytes);
            Value::Ip(u128_to_ip(u128::from_be_bytes(buf)))
        }
        t if t == TypeCode::Json as u8 => {
            let text = reader.read_string()?;
            Value::Json(serde_json::from_str(&text)?)
        }
        other => {
            return Err(FathomError::corrupted(format!(
                "Unknown stored value tag {other}"
            )));
        }
    };
    Ok(value)
}

/// Streams stored documents into the store file.
pub struct StoreWriter {
    writer: StructWriter,
    schema: Schema,
    offsets: Vec<u64>,
}

impl StoreWriter {
    /// Wrap a fresh store file output.
    pub fn new(writer: StructWriter, schema: Schema) -> StoreWriter {
        StoreWriter {
            writer,
            schema,
            offsets: Vec::new(),
        }
    }

    /// Append the stored fields of the next document.
    pub fn store(&mut self, doc: &Document) -> Result<()> {
        self.offsets.push(self.writer.position());
        let stored: Vec<_> = doc
            .field_values()
            .iter()
            .filter(|fv| self.schema.get_field_entry(fv.field).options.stored)
            .collect();
        self.writer.write_varint(stored.len() as u64)?;
        for fv in stored {
            self.writer.write_u32(fv.field.0)?;
            write_value(&mut self.writer, &fv.value)?;
        }
        Ok(())
    }

    /// Write the offset table and footer, then seal the file.
    pub fn close(mut self) -> Result<()> {
        let table_offset = self.writer.position();
        for offset in &self.offsets {
            self.writer.write_u64(*offset)?;
        }
        self.writer.write_u32(self.offsets.len() as u32)?;
        self.writer.write_u64(table_offset)?;
        self.writer.close()
    }
}

/// Random-access reader over the store file.
pub struct StoreReader {
    data: StructReader,
    table_offset: usize,
    num_docs: u32,
}

impl StoreReader {
    /// Open a checksummed store file body.
    pub fn open(data: StructReader) -> Result<StoreReader> {
        let body_len = data.body_len();
        if body_len < 12 {
            return Err(FathomError::corrupted("Store file too short"));
        }
        let mut footer = data.fork(body_len - 12)?;
        let num_docs = footer.read_u32()?;
        let table_offset = footer.read_u64()? as usize;
        if table_offset > body_len {
            return Err(FathomError::corrupted("Store offset table out of bounds"));
        }
        Ok(StoreReader {
            data,
            table_offset,
            num_docs,
        })
    }

    /// Number of documents in the store.
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// Fetch one document's stored fields.
    pub fn get(&self, doc_id: DocId) -> Result<Document> {
        if doc_id >= self.num_docs {
            return Err(FathomError::corrupted(format!(
                "Doc id {doc_id} out of bounds ({} stored)",
                self.num_docs
            )));
        }
        let mut table = self
            .data
            .fork(self.table_offset + doc_id as usize * 8)?;
        let doc_offset = table.read_u64()? as usize;
        let mut reader = self.data.fork(doc_offset)?;
        let num_values = reader.read_varint()? as usize;
        let mut doc = Document::new();
        for _ in 0..num_values {
            let field = Field(reader.read_u32()?);
            doc.add_value(field, read_value(&mut reader)?);
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::{Storage, read_all};

    fn schema() -> (Schema, Field, Field, Field) {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", FieldOptions::default());
        let count = builder.add_u64_field("count", FieldOptions::default());
        let hidden = builder.add_text_field("hidden", FieldOptions::default().unstored());
        (builder.build().unwrap(), title, count, hidden)
    }

    fn round_trip(docs: &[Document], schema: Schema) -> StoreReader {
        let storage = MemoryStorage::new();
        let out = StructWriter::new(storage.create_output("s").unwrap());
        let mut writer = StoreWriter::new(out, schema);
        for doc in docs {
            writer.store(doc).unwrap();
        }
        writer.close().unwrap();
        let data = StructReader::open(read_all(&storage, "s").unwrap()).unwrap();
        StoreReader::open(data).unwrap()
    }

    #[test]
    fn test_store_round_trip() {
        let (schema, title, count, _) = schema();
        let mut first = Document::new();
        first.add_text(title, "the old man and the sea");
        first.add_u64(count, 1952);
        let mut second = Document::new();
        second.add_text(title, "of mice and men");

        let reader = round_trip(&[first, second], schema);
        assert_eq!(reader.num_docs(), 2);

        let doc = reader.get(0).unwrap();
        assert_eq!(
            doc.get_first(title).and_then(|v| v.as_str()),
            Some("the old man and the sea")
        );
        assert_eq!(doc.get_first(count).and_then(|v| v.as_u64()), Some(1952));

        let doc = reader.get(1).unwrap();
        assert_eq!(
            doc.get_first(title).and_then(|v| v.as_str()),
            Some("of mice and men")
        );
        assert!(reader.get(2).is_err());
    }

    #[test]
    fn test_unstored_fields_dropped() {
        let (schema, title, _, hidden) = schema();
        let mut doc = Document::new();
        doc.add_text(title, "kept");
        doc.add_text(hidden, "dropped");

        let reader = round_trip(&[doc], schema);
        let restored = reader.get(0).unwrap();
        assert_eq!(restored.len(), 1);
        assert!(restored.get_first(hidden).is_none());
    }

    #[test]
    fn test_typed_values_round_trip() {
        let mut builder = Schema::builder();
        let date = builder.add_date_field("date", FieldOptions::default());
        let ip = builder.add_ip_field("ip", FieldOptions::default());
        let facet = builder.add_facet_field("cat", FieldOptions::default());
        let json = builder.add_json_field("attrs", FieldOptions::default());
        let schema = builder.build().unwrap();

        let when = DateTime::from_timestamp_nanos(1_700_000_000_123_456_789);
        let mut doc = Document::new();
        doc.add_date(date, when);
        doc.add_ip(ip, "10.0.0.1".parse().unwrap());
        doc.add_facet(facet, Facet::from_text("/fiction/classic").unwrap());
        doc.add_json(json, serde_json::json!({"pages": 127}));

        let reader = round_trip(std::slice::from_ref(&doc), schema);
        let restored = reader.get(0).unwrap();
        assert_eq!(restored.get_first(date).and_then(|v| v.as_date()), Some(when));
        assert_eq!(
            restored
                .get_first(facet)
                .and_then(|v| v.as_facet())
                .map(|f| f.to_path_string()),
            Some("/fiction/classic".to_string())
        );
        assert_eq!(
            restored.get_first(json).and_then(|v| v.as_json()),
            Some(&serde_json::json!({"pages": 127}))
        );
        // v4 input comes back in the normalized v6-mapped space
        let restored_ip = restored.get_first(ip).and_then(|v| v.as_ip()).unwrap();
        assert_eq!(
            crate::schema::term::ip_to_u128(restored_ip),
            crate::schema::term::ip_to_u128("10.0.0.1".parse().unwrap())
        );
    }
}
