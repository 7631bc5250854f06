//! The index manifest.
//!
//! `meta.json` is the single source of truth for what an index contains:
//! the schema, the list of live segments, and the opstamp of the last
//! commit. Every commit rewrites it in one [`Storage::atomic_write`], so a
//! reader either sees the previous committed state or the new one.

use serde::{Deserialize, Serialize};

use crate::error::{FathomError, Result};
use crate::schema::Schema;
use crate::segment::SegmentMeta;
use crate::storage::{Storage, read_all};

/// File name of the manifest within index storage.
pub const MANIFEST_FILE: &str = "meta.json";

/// The persisted state of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    /// The index schema. Fixed at creation.
    pub schema: Schema,
    /// Live segments, in creation order.
    pub segments: Vec<SegmentMeta>,
    /// Opstamp of the last commit. Zero for a fresh index.
    pub opstamp: u64,
}

impl IndexMeta {
    /// Manifest of a brand-new index.
    pub fn new(schema: Schema) -> IndexMeta {
        IndexMeta {
            schema,
            segments: Vec::new(),
            opstamp: 0,
        }
    }

    /// Load the manifest from storage.
    pub fn load(storage: &dyn Storage) -> Result<IndexMeta> {
        let data = read_all(storage, MANIFEST_FILE)?;
        serde_json::from_slice(&data)
            .map_err(|e| FathomError::corrupted(format!("Invalid manifest: {e}")))
    }

    /// Persist the manifest atomically.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        storage.atomic_write(MANIFEST_FILE, &data)
    }

    /// Total number of live documents recorded in the manifest.
    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_alive() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;
    use crate::segment::SegmentId;
    use crate::storage::MemoryStorage;

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("title", FieldOptions::default());
        builder.build().unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let storage = MemoryStorage::new();
        let mut meta = IndexMeta::new(schema());
        meta.segments.push(SegmentMeta {
            id: SegmentId::generate(),
            max_doc: 10,
            num_deleted: 3,
        });
        meta.opstamp = 42;
        meta.save(&storage).unwrap();

        let loaded = IndexMeta::load(&storage).unwrap();
        assert_eq!(loaded.opstamp, 42);
        assert_eq!(loaded.segments, meta.segments);
        assert_eq!(loaded.num_docs(), 7);
    }

    #[test]
    fn test_load_garbage_is_corrupted() {
        let storage = MemoryStorage::new();
        storage.atomic_write(MANIFEST_FILE, b"not json").unwrap();
        assert!(matches!(
            IndexMeta::load(&storage).unwrap_err(),
            FathomError::Corrupted(_)
        ));
    }
}
