//! Columnar fast fields.
//!
//! Fast fields hold one value per document in a flat array so sorting and
//! aggregation never touch the stored document store. Numeric, date, and
//! boolean values are stored in their order-preserving u64 form (see
//! [`crate::schema::term`]); IP addresses use the 128-bit normalized form.
//! A presence bitmap marks documents with no value for the field.
//!
//! The same file also carries per-field token lengths for indexed text
//! fields, which scoring needs for length normalization.

use ahash::AHashMap;
use bit_vec::BitVec;

use crate::error::{FathomError, Result};
use crate::postings::DocId;
use crate::schema::Field;
use crate::storage::structured::{StructReader, StructWriter};

/// The value array of one column.
#[derive(Debug, Clone)]
pub enum ColumnValues {
    /// Order-mapped 64-bit values (u64, i64, f64, date, bool).
    U64(Vec<u64>),
    /// 128-bit values (IP addresses).
    U128(Vec<u128>),
}

/// One document-indexed column.
#[derive(Debug, Clone)]
pub struct FastColumn {
    present: BitVec,
    values: ColumnValues,
}

impl FastColumn {
    /// The order-mapped u64 value of a document, if present.
    pub fn get_u64(&self, doc_id: DocId) -> Option<u64> {
        if !self.present.get(doc_id as usize).unwrap_or(false) {
            return None;
        }
        match &self.values {
            ColumnValues::U64(values) => values.get(doc_id as usize).copied(),
            ColumnValues::U128(_) => None,
        }
    }

    /// The 128-bit value of a document, if present.
    pub fn get_u128(&self, doc_id: DocId) -> Option<u128> {
        if !self.present.get(doc_id as usize).unwrap_or(false) {
            return None;
        }
        match &self.values {
            ColumnValues::U64(values) => values.get(doc_id as usize).map(|&v| v as u128),
            ColumnValues::U128(values) => values.get(doc_id as usize).copied(),
        }
    }

    /// True if the document carries a value.
    pub fn is_present(&self, doc_id: DocId) -> bool {
        self.present.get(doc_id as usize).unwrap_or(false)
    }
}

/// Accumulates one column while a segment is written.
#[derive(Debug)]
pub struct FastColumnBuilder {
    wide: bool,
    present: Vec<bool>,
    values_u64: Vec<u64>,
    values_u128: Vec<u128>,
}

impl FastColumnBuilder {
    /// A 64-bit column builder.
    pub fn new_u64() -> FastColumnBuilder {
        FastColumnBuilder {
            wide: false,
            present: Vec::new(),
            values_u64: Vec::new(),
            values_u128: Vec::new(),
        }
    }

    /// A 128-bit column builder.
    pub fn new_u128() -> FastColumnBuilder {
        FastColumnBuilder {
            wide: true,
            present: Vec::new(),
            values_u64: Vec::new(),
            values_u128: Vec::new(),
        }
    }

    fn pad_to(&mut self, doc_id: DocId) {
        while self.present.len() < doc_id as usize {
            self.present.push(false);
            if self.wide {
                self.values_u128.push(0);
            } else {
                self.values_u64.push(0);
            }
        }
    }

    /// Record a 64-bit value. The first value per document wins.
    pub fn record_u64(&mut self, doc_id: DocId, value: u64) {
        self.pad_to(doc_id);
        if self.present.len() > doc_id as usize {
            return; // already recorded for this doc
        }
        self.present.push(true);
        self.values_u64.push(value);
    }

    /// Record a 128-bit value. The first value per document wins.
    pub fn record_u128(&mut self, doc_id: DocId, value: u128) {
        self.pad_to(doc_id);
        if self.present.len() > doc_id as usize {
            return;
        }
        self.present.push(true);
        self.values_u128.push(value);
    }

    fn write(mut self, max_doc: u32, writer: &mut StructWriter) -> Result<()> {
        self.pad_to(max_doc);
        writer.write_u8(self.wide as u8)?;
        let bitmap: BitVec = self.present.iter().copied().collect();
        writer.write_len_bytes(&bitmap.to_bytes())?;
        if self.wide {
            for value in &self.values_u128 {
                writer.write_u64(*value as u64)?;
                writer.write_u64((*value >> 64) as u64)?;
            }
        } else {
            for value in &self.values_u64 {
                writer.write_u64(*value)?;
            }
        }
        Ok(())
    }
}

/// Writes the fast field file: columns first, then text field lengths.
pub fn write_fast_fields(
    writer: &mut StructWriter,
    max_doc: u32,
    columns: Vec<(Field, FastColumnBuilder)>,
    lengths: Vec<(Field, Vec<u32>)>,
) -> Result<()> {
    writer.write_u32(max_doc)?;
    writer.write_varint(columns.len() as u64)?;
    for (field, builder) in columns {
        writer.write_u32(field.0)?;
        builder.write(max_doc, writer)?;
    }
    writer.write_varint(lengths.len() as u64)?;
    for (field, doc_lengths) in lengths {
        writer.write_u32(field.0)?;
        let mut padded = doc_lengths;
        padded.resize(max_doc as usize, 0);
        for len in &padded {
            writer.write_varint(*len as u64)?;
        }
    }
    Ok(())
}

/// Per-field token lengths of indexed text fields, for score normalization.
#[derive(Debug, Default)]
pub struct FieldLengths {
    lengths: AHashMap<u32, Vec<u32>>,
}

impl FieldLengths {
    /// Token count of a field in a document (0 when absent).
    pub fn length(&self, field: Field, doc_id: DocId) -> u32 {
        self.lengths
            .get(&field.0)
            .and_then(|lens| lens.get(doc_id as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Total token count of a field across the whole segment.
    pub fn total_length(&self, field: Field) -> u64 {
        self.lengths
            .get(&field.0)
            .map(|lens| lens.iter().map(|&l| l as u64).sum())
            .unwrap_or(0)
    }
}

/// All fast columns and field lengths of one segment.
#[derive(Debug, Default)]
pub struct FastFieldReaders {
    max_doc: u32,
    columns: AHashMap<u32, FastColumn>,
    lengths: FieldLengths,
}

impl FastFieldReaders {
    /// Deserialize from a structured reader.
    pub fn open(reader: &mut StructReader) -> Result<FastFieldReaders> {
        let max_doc = reader.read_u32()?;
        let num_columns = reader.read_varint()? as usize;
        let mut columns = AHashMap::with_capacity(num_columns);
        for _ in 0..num_columns {
            let field_ord = reader.read_u32()?;
            let wide = reader.read_u8()? != 0;
            let bitmap_bytes = reader.read_len_bytes()?;
            if bitmap_bytes.len() * 8 < max_doc as usize {
                return Err(FathomError::corrupted("Fast field bitmap too short"));
            }
            let present = BitVec::from_bytes(&bitmap_bytes);
            let values = if wide {
                let mut values = Vec::with_capacity(max_doc as usize);
                for _ in 0..max_doc {
                    let lo = reader.read_u64()? as u128;
                    let hi = reader.read_u64()? as u128;
                    values.push(lo | (hi << 64));
                }
                ColumnValues::U128(values)
            } else {
                let mut values = Vec::with_capacity(max_doc as usize);
                for _ in 0..max_doc {
                    values.push(reader.read_u64()?);
                }
                ColumnValues::U64(values)
            };
            columns.insert(field_ord, FastColumn { present, values });
        }
        let num_len_fields = reader.read_varint()? as usize;
        let mut lengths = AHashMap::with_capacity(num_len_fields);
        for _ in 0..num_len_fields {
            let field_ord = reader.read_u32()?;
            let mut doc_lengths = Vec::with_capacity(max_doc as usize);
            for _ in 0..max_doc {
                doc_lengths.push(reader.read_varint()? as u32);
            }
            lengths.insert(field_ord, doc_lengths);
        }
        Ok(FastFieldReaders {
            max_doc,
            columns,
            lengths: FieldLengths { lengths },
        })
    }

    /// Number of documents covered.
    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    /// The column of a field, if the field is fast.
    pub fn column(&self, field: Field) -> Option<&FastColumn> {
        self.columns.get(&field.0)
    }

    /// Text field lengths.
    pub fn lengths(&self) -> &FieldLengths {
        &self.lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::{Storage, read_all};

    fn round_trip(
        max_doc: u32,
        columns: Vec<(Field, FastColumnBuilder)>,
        lengths: Vec<(Field, Vec<u32>)>,
    ) -> FastFieldReaders {
        let storage = MemoryStorage::new();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        write_fast_fields(&mut writer, max_doc, columns, lengths).unwrap();
        writer.close().unwrap();
        let mut reader = StructReader::open(read_all(&storage, "f").unwrap()).unwrap();
        FastFieldReaders::open(&mut reader).unwrap()
    }

    #[test]
    fn test_u64_column_with_gaps() {
        let field = Field(0);
        let mut builder = FastColumnBuilder::new_u64();
        builder.record_u64(0, 30);
        builder.record_u64(2, 10);
        // doc 1 has no value

        let readers = round_trip(3, vec![(field, builder)], vec![]);
        let column = readers.column(field).unwrap();
        assert_eq!(column.get_u64(0), Some(30));
        assert_eq!(column.get_u64(1), None);
        assert_eq!(column.get_u64(2), Some(10));
        assert!(!column.is_present(1));
    }

    #[test]
    fn test_first_value_wins() {
        let field = Field(0);
        let mut builder = FastColumnBuilder::new_u64();
        builder.record_u64(0, 7);
        builder.record_u64(0, 99);

        let readers = round_trip(1, vec![(field, builder)], vec![]);
        assert_eq!(readers.column(field).unwrap().get_u64(0), Some(7));
    }

    #[test]
    fn test_u128_column() {
        let field = Field(1);
        let mut builder = FastColumnBuilder::new_u128();
        let value = (7u128 << 80) | 42;
        builder.record_u128(0, value);

        let readers = round_trip(1, vec![(field, builder)], vec![]);
        let column = readers.column(field).unwrap();
        assert_eq!(column.get_u128(0), Some(value));
        assert_eq!(column.get_u64(0), None);
    }

    #[test]
    fn test_field_lengths() {
        let body = Field(0);
        let readers = round_trip(3, vec![], vec![(body, vec![6, 4])]);
        let lengths = readers.lengths();
        assert_eq!(lengths.length(body, 0), 6);
        assert_eq!(lengths.length(body, 1), 4);
        assert_eq!(lengths.length(body, 2), 0); // padded
        assert_eq!(lengths.total_length(body), 10);
    }
}
