//! The per-segment term dictionary.
//!
//! Terms are stored in an [`fst::Map`] keyed by the serialized term bytes;
//! the map value is the term's ordinal into a side table of [`TermInfo`]
//! entries. Because term bytes are order-preserving (see
//! [`crate::schema::term`]), range and prefix queries reduce to contiguous
//! streams over the fst.

use std::ops::Bound;

use fst::{IntoStreamer, Streamer};

use crate::error::Result;
use crate::storage::structured::{StructReader, StructWriter};

/// Dictionary metadata for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    /// Byte offset of the posting list within the postings file body.
    pub posting_offset: u64,
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total occurrences of the term across all documents.
    pub total_term_freq: u64,
}

/// Builds the term dictionary file. Terms must be inserted in ascending
/// byte order, which the segment writer guarantees by draining a `BTreeMap`.
pub struct TermDictionaryBuilder {
    fst_builder: fst::MapBuilder<Vec<u8>>,
    infos: Vec<TermInfo>,
}

impl TermDictionaryBuilder {
    /// Create an empty builder.
    pub fn new() -> TermDictionaryBuilder {
        TermDictionaryBuilder {
            fst_builder: fst::MapBuilder::memory(),
            infos: Vec::new(),
        }
    }

    /// Insert the next term in ascending order.
    pub fn insert(&mut self, term_bytes: &[u8], info: TermInfo) -> Result<()> {
        self.fst_builder
            .insert(term_bytes, self.infos.len() as u64)?;
        self.infos.push(info);
        Ok(())
    }

    /// Serialize the dictionary into a structured writer.
    pub fn write(self, writer: &mut StructWriter) -> Result<()> {
        let fst_bytes = self.fst_builder.into_inner()?;
        writer.write_len_bytes(&fst_bytes)?;
        writer.write_varint(self.infos.len() as u64)?;
        for info in &self.infos {
            writer.write_varint(info.posting_offset)?;
            writer.write_varint(info.doc_freq as u64)?;
            writer.write_varint(info.total_term_freq)?;
        }
        Ok(())
    }
}

impl Default for TermDictionaryBuilder {
    fn default() -> Self {
        TermDictionaryBuilder::new()
    }
}

/// A read-only term dictionary.
pub struct TermDictionary {
    map: fst::Map<Vec<u8>>,
    infos: Vec<TermInfo>,
}

impl TermDictionary {
    /// Deserialize a dictionary from a structured reader.
    pub fn open(reader: &mut StructReader) -> Result<TermDictionary> {
        let fst_bytes = reader.read_len_bytes()?;
        let map = fst::Map::new(fst_bytes)?;
        let num_terms = reader.read_varint()? as usize;
        let mut infos = Vec::with_capacity(num_terms);
        for _ in 0..num_terms {
            infos.push(TermInfo {
                posting_offset: reader.read_varint()?,
                doc_freq: reader.read_varint()? as u32,
                total_term_freq: reader.read_varint()?,
            });
        }
        Ok(TermDictionary { map, infos })
    }

    /// Number of distinct terms.
    pub fn num_terms(&self) -> usize {
        self.infos.len()
    }

    /// Look up one exact term.
    pub fn get(&self, term_bytes: &[u8]) -> Option<TermInfo> {
        self.map
            .get(term_bytes)
            .map(|ord| self.infos[ord as usize])
    }

    /// All terms within the byte range, in ascending order.
    pub fn range(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Vec<(Vec<u8>, TermInfo)> {
        let mut builder = self.map.range();
        builder = match lower {
            Bound::Included(bytes) => builder.ge(bytes),
            Bound::Excluded(bytes) => builder.gt(bytes),
            Bound::Unbounded => builder,
        };
        builder = match upper {
            Bound::Included(bytes) => builder.le(bytes),
            Bound::Excluded(bytes) => builder.lt(bytes),
            Bound::Unbounded => builder,
        };
        let mut stream = builder.into_stream();
        let mut entries = Vec::new();
        while let Some((key, ord)) = stream.next() {
            entries.push((key.to_vec(), self.infos[ord as usize]));
        }
        entries
    }

    /// All terms sharing a byte prefix, in ascending order.
    pub fn prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, TermInfo)> {
        let mut stream = self.map.range().ge(prefix).into_stream();
        let mut entries = Vec::new();
        while let Some((key, ord)) = stream.next() {
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), self.infos[ord as usize]));
        }
        entries
    }

    /// Every term in the dictionary, in ascending order.
    pub fn all(&self) -> Vec<(Vec<u8>, TermInfo)> {
        self.range(Bound::Unbounded, Bound::Unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::{Storage, read_all};

    fn info(offset: u64) -> TermInfo {
        TermInfo {
            posting_offset: offset,
            doc_freq: 1,
            total_term_freq: 1,
        }
    }

    fn build(terms: &[&[u8]]) -> TermDictionary {
        let storage = MemoryStorage::new();
        let mut builder = TermDictionaryBuilder::new();
        for (idx, term) in terms.iter().enumerate() {
            builder.insert(term, info(idx as u64 * 10)).unwrap();
        }
        let mut writer = StructWriter::new(storage.create_output("d").unwrap());
        builder.write(&mut writer).unwrap();
        writer.close().unwrap();
        let mut reader = StructReader::open(read_all(&storage, "d").unwrap()).unwrap();
        TermDictionary::open(&mut reader).unwrap()
    }

    #[test]
    fn test_exact_lookup() {
        let dict = build(&[b"and", b"man", b"sea"]);
        assert_eq!(dict.num_terms(), 3);
        assert_eq!(dict.get(b"man").unwrap().posting_offset, 10);
        assert!(dict.get(b"men").is_none());
    }

    #[test]
    fn test_range_bounds() {
        let dict = build(&[b"a", b"b", b"c", b"d"]);
        let keys = |entries: Vec<(Vec<u8>, TermInfo)>| {
            entries.into_iter().map(|(k, _)| k).collect::<Vec<_>>()
        };

        let inclusive = dict.range(Bound::Included(b"b"), Bound::Included(b"c"));
        assert_eq!(keys(inclusive), vec![b"b".to_vec(), b"c".to_vec()]);

        let exclusive = dict.range(Bound::Excluded(b"b"), Bound::Excluded(b"d"));
        assert_eq!(keys(exclusive), vec![b"c".to_vec()]);

        let open = dict.range(Bound::Unbounded, Bound::Excluded(b"b"));
        assert_eq!(keys(open), vec![b"a".to_vec()]);
    }

    #[test]
    fn test_prefix_stream_stops_at_boundary() {
        let dict = build(&[b"sea", b"seal", b"season", b"sew"]);
        let matched: Vec<_> = dict.prefix(b"sea").into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            matched,
            vec![b"sea".to_vec(), b"seal".to_vec(), b"season".to_vec()]
        );
    }

    #[test]
    fn test_empty_dictionary() {
        let dict = build(&[]);
        assert_eq!(dict.num_terms(), 0);
        assert!(dict.all().is_empty());
    }
}
