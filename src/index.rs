//! Index handles.
//!
//! An [`Index`] ties together a storage backend, a schema, and an analyzer
//! registry. It is cheap to clone and safe to share; writers and readers
//! are spawned from it. The on-disk layout is flat: one `meta.json`
//! manifest plus the per-segment files described in [`crate::segment`].

pub mod manifest;
pub mod reader;
pub mod writer;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::analysis::registry::AnalyzerRegistry;
use crate::error::{FathomError, Result};
use crate::schema::Schema;
use crate::storage::{FsStorage, MemoryStorage, Storage};

pub use manifest::{IndexMeta, MANIFEST_FILE};
pub use reader::IndexReader;
pub use writer::IndexWriter;

/// A handle on one index. Clones share storage and analyzers.
#[derive(Debug, Clone)]
pub struct Index {
    storage: Arc<dyn Storage>,
    schema: Schema,
    registry: Arc<AnalyzerRegistry>,
    writer_lock: Arc<AtomicBool>,
}

impl Index {
    /// Create a new index in ephemeral in-memory storage.
    pub fn create_in_ram(schema: Schema) -> Result<Index> {
        Index::create(Arc::new(MemoryStorage::new()), schema)
    }

    /// Create a new index in a directory. Fails if the directory already
    /// holds an index.
    pub fn create_in_dir<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Index> {
        let storage = FsStorage::open(path.as_ref())?;
        if storage.file_exists(MANIFEST_FILE) {
            return Err(FathomError::index(format!(
                "Directory `{}` already contains an index",
                path.as_ref().display()
            )));
        }
        Index::create(Arc::new(storage), schema)
    }

    /// Create a new index on the given storage.
    pub fn create(storage: Arc<dyn Storage>, schema: Schema) -> Result<Index> {
        IndexMeta::new(schema.clone()).save(storage.as_ref())?;
        Ok(Index {
            storage,
            schema,
            registry: Arc::new(AnalyzerRegistry::new()),
            writer_lock: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open an existing index from a directory.
    pub fn open_in_dir<P: AsRef<Path>>(path: P) -> Result<Index> {
        Index::open(Arc::new(FsStorage::open(path.as_ref())?))
    }

    /// Open an existing index on the given storage.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Index> {
        let meta = IndexMeta::load(storage.as_ref())?;
        Ok(Index {
            storage,
            schema: meta.schema,
            registry: Arc::new(AnalyzerRegistry::new()),
            writer_lock: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open the index in a directory, creating it if absent. Opening with
    /// a schema that differs from the persisted one is an error.
    pub fn open_or_create<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Index> {
        let storage = FsStorage::open(path.as_ref())?;
        if !storage.file_exists(MANIFEST_FILE) {
            return Index::create(Arc::new(storage), schema);
        }
        let index = Index::open(Arc::new(storage))?;
        if index.schema != schema {
            return Err(FathomError::schema(
                "Existing index schema does not match the requested schema".to_string(),
            ));
        }
        Ok(index)
    }

    /// The index schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The analyzer registry. Register custom analyzers here before
    /// indexing or parsing queries.
    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub(crate) fn registry_handle(&self) -> Arc<AnalyzerRegistry> {
        self.registry.clone()
    }

    pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Load the current manifest.
    pub fn load_meta(&self) -> Result<IndexMeta> {
        IndexMeta::load(self.storage.as_ref())
    }

    /// Spawn the writer. Only one writer may exist per index handle
    /// family at a time; the slot frees when the writer is dropped or
    /// consumed.
    pub fn writer(&self) -> Result<IndexWriter> {
        if self
            .writer_lock
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FathomError::index(
                "An index writer is already active for this index".to_string(),
            ));
        }
        IndexWriter::open(self.clone(), self.writer_lock.clone())
    }

    /// Spawn a reader. The reader holds a snapshot until reloaded.
    pub fn reader(&self) -> Result<IndexReader> {
        IndexReader::open(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("body", FieldOptions::default());
        builder.build().unwrap()
    }

    #[test]
    fn test_create_in_ram_writes_manifest() {
        let index = Index::create_in_ram(schema()).unwrap();
        let meta = index.load_meta().unwrap();
        assert_eq!(meta.opstamp, 0);
        assert!(meta.segments.is_empty());
    }

    #[test]
    fn test_single_active_writer() {
        let index = Index::create_in_ram(schema()).unwrap();
        let writer = index.writer().unwrap();
        assert!(matches!(
            index.writer().unwrap_err(),
            FathomError::Index(_)
        ));
        drop(writer);
        assert!(index.writer().is_ok());
    }

    #[test]
    fn test_open_or_create_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let created = Index::open_or_create(dir.path(), schema()).unwrap();
        drop(created);
        let reopened = Index::open_or_create(dir.path(), schema()).unwrap();
        assert_eq!(reopened.load_meta().unwrap().opstamp, 0);

        let mut other = Schema::builder();
        other.add_u64_field("count", FieldOptions::default());
        let other = other.build().unwrap();
        assert!(matches!(
            Index::open_or_create(dir.path(), other).unwrap_err(),
            FathomError::Schema(_)
        ));
    }
}
