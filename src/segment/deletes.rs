//! Per-segment deletion bitmaps.
//!
//! Deletes never touch the sealed segment files. Instead each segment
//! carries a side bitmap with one bit per doc id, rewritten as a whole
//! through [`crate::storage::Storage::atomic_write`] at commit time. A
//! missing bitmap file means no document is deleted.

use bit_vec::BitVec;
use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FathomError, Result};
use crate::postings::DocId;

/// The set of deleted doc ids of one segment.
#[derive(Debug, Clone)]
pub struct DeleteSet {
    bits: BitVec,
}

impl DeleteSet {
    /// An empty set covering `max_doc` documents.
    pub fn new(max_doc: u32) -> DeleteSet {
        DeleteSet {
            bits: BitVec::from_elem(max_doc as usize, false),
        }
    }

    /// Mark a document deleted. Returns true if it was alive before.
    pub fn delete(&mut self, doc_id: DocId) -> bool {
        let was_alive = !self.bits.get(doc_id as usize).unwrap_or(true);
        self.bits.set(doc_id as usize, true);
        was_alive
    }

    /// True if the document is deleted.
    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        self.bits.get(doc_id as usize).unwrap_or(false)
    }

    /// Number of deleted documents.
    pub fn num_deleted(&self) -> u32 {
        self.bits.iter().filter(|&b| b).count() as u32
    }

    /// Serialize with a length header and CRC32 footer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let bitmap = self.bits.to_bytes();
        let mut data = Vec::with_capacity(8 + bitmap.len());
        let mut header = [0u8; 4];
        LittleEndian::write_u32(&mut header, self.bits.len() as u32);
        data.extend_from_slice(&header);
        data.extend_from_slice(&bitmap);
        let mut footer = [0u8; 4];
        LittleEndian::write_u32(&mut footer, crc32fast::hash(&data));
        data.extend_from_slice(&footer);
        data
    }

    /// Deserialize, verifying the checksum and the expected doc count.
    pub fn from_bytes(data: &[u8], max_doc: u32) -> Result<DeleteSet> {
        if data.len() < 8 {
            return Err(FathomError::corrupted("Deletion bitmap too short"));
        }
        let body = &data[..data.len() - 4];
        let expected = LittleEndian::read_u32(&data[data.len() - 4..]);
        if crc32fast::hash(body) != expected {
            return Err(FathomError::corrupted("Deletion bitmap checksum mismatch"));
        }
        let nbits = LittleEndian::read_u32(&body[..4]);
        if nbits != max_doc {
            return Err(FathomError::corrupted(format!(
                "Deletion bitmap covers {nbits} docs, segment has {max_doc}"
            )));
        }
        let mut bits = BitVec::from_bytes(&body[4..]);
        bits.truncate(nbits as usize);
        Ok(DeleteSet { bits })
    }
}
