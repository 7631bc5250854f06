//! In-memory storage backend.

use std::io::{Read, Write};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{FathomError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};

type FileMap = Arc<RwLock<AHashMap<String, Arc<Vec<u8>>>>>;

/// Storage backed by an in-process map. Cheap to clone; clones share files.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: FileMap,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buf: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FathomError::index(format!("File not found: {name}")))?;
        Ok(Box::new(MemoryInput { data, pos: 0 }))
    }

    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files
            .write()
            .insert(name.to_string(), Arc::new(data.to_vec()));
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.write().remove(name);
        Ok(())
    }
}

struct MemoryOutput {
    name: String,
    buf: Vec<u8>,
    files: FileMap,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn close(self: Box<Self>) -> Result<()> {
        self.files.write().insert(self.name, Arc::new(self.buf));
        Ok(())
    }
}

struct MemoryInput {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl StorageInput for MemoryInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_all;

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new();
        let mut out = storage.create_output("a.bin").unwrap();
        out.write_all(b"hello").unwrap();
        // Not visible until closed.
        assert!(storage.open_input("a.bin").is_err());
        out.close().unwrap();

        assert_eq!(read_all(&storage, "a.bin").unwrap(), b"hello");
        assert!(storage.file_exists("a.bin"));
    }

    #[test]
    fn test_atomic_write_and_delete() {
        let storage = MemoryStorage::new();
        storage.atomic_write("meta.json", b"v1").unwrap();
        storage.atomic_write("meta.json", b"v2").unwrap();
        assert_eq!(read_all(&storage, "meta.json").unwrap(), b"v2");

        storage.delete_file("meta.json").unwrap();
        assert!(!storage.file_exists("meta.json"));
        // Deleting again is fine.
        storage.delete_file("meta.json").unwrap();
    }

    #[test]
    fn test_clones_share_files() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        storage.atomic_write("shared", b"x").unwrap();
        assert!(clone.file_exists("shared"));
    }
}
