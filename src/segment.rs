//! Immutable index segments.
//!
//! A segment is a self-contained, write-once slice of the index. Once its
//! files are sealed they are never modified; the only mutable companion is
//! the deletion bitmap, which is rewritten atomically as a whole. Each
//! segment owns a handful of files, all named after its id:
//!
//! - `<id>.term`: fst term dictionary mapping terms to posting metadata
//! - `<id>.post`: delta-encoded posting lists
//! - `<id>.store`: stored document values with a doc offset table
//! - `<id>.fast`: columnar fast fields and per-field token lengths
//! - `<id>.del`: deletion bitmap (absent when nothing is deleted)
//!
//! Doc ids are dense `u32` ordinals local to the segment and are never
//! stable across merges.

pub mod deletes;
pub mod fastfield;
pub mod merge;
pub mod reader;
pub mod store;
pub mod term_dict;
pub mod writer;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use reader::SegmentReader;
pub use writer::SegmentWriter;

/// Unique identifier of a segment within an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(Uuid);

impl SegmentId {
    /// Generate a fresh random id.
    pub fn generate() -> SegmentId {
        SegmentId(Uuid::new_v4())
    }

    /// Parse an id from its string form.
    pub fn from_str_id(text: &str) -> Option<SegmentId> {
        Uuid::parse_str(text).ok().map(SegmentId)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Metadata of one sealed segment, recorded in the index manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// The segment id.
    pub id: SegmentId,
    /// Number of documents in the segment, deleted ones included.
    pub max_doc: u32,
    /// Number of documents marked deleted at the time the manifest
    /// was written.
    pub num_deleted: u32,
}

impl SegmentMeta {
    /// Number of live documents.
    pub fn num_alive(&self) -> u32 {
        self.max_doc - self.num_deleted
    }

    /// Name of the term dictionary file.
    pub fn term_file(&self) -> String {
        format!("{}.term", self.id)
    }

    /// Name of the postings file.
    pub fn postings_file(&self) -> String {
        format!("{}.post", self.id)
    }

    /// Name of the stored document file.
    pub fn store_file(&self) -> String {
        format!("{}.store", self.id)
    }

    /// Name of the fast field file.
    pub fn fast_file(&self) -> String {
        format!("{}.fast", self.id)
    }

    /// Name of the deletion bitmap file.
    pub fn deletes_file(&self) -> String {
        format!("{}.del", self.id)
    }

    /// All file names belonging to this segment.
    pub fn file_names(&self) -> Vec<String> {
        vec![
            self.term_file(),
            self.postings_file(),
            self.store_file(),
            self.fast_file(),
            self.deletes_file(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_ids_unique() {
        assert_ne!(SegmentId::generate(), SegmentId::generate());
    }

    #[test]
    fn test_segment_id_round_trip() {
        let id = SegmentId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let restored: SegmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_meta_file_names() {
        let meta = SegmentMeta {
            id: SegmentId::generate(),
            max_doc: 10,
            num_deleted: 3,
        };
        assert_eq!(meta.num_alive(), 7);
        assert!(meta.term_file().ends_with(".term"));
        assert_eq!(meta.file_names().len(), 5);
    }
}
