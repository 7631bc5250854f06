//! Storage backends for index files.
//!
//! The engine persists segments and the manifest through the [`Storage`]
//! trait. Two backends are provided: an in-memory store for tests and
//! ephemeral indexes, and a local-directory store with memory-mapped reads.
//! Segment files are append-only and never modified after close; the only
//! files rewritten in place are the per-segment deletion bitmap and the
//! manifest, both of which go through [`Storage::atomic_write`].

pub mod filesystem;
pub mod memory;
pub mod structured;

use std::fmt;
use std::io::{Read, Write};

use crate::error::Result;

pub use filesystem::FsStorage;
pub use memory::MemoryStorage;
pub use structured::{StructReader, StructWriter};

/// A write handle for one storage file.
pub trait StorageOutput: Write + Send {
    /// Flush and seal the file. Data is not guaranteed visible to
    /// `open_input` until close returns.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A read handle for one storage file.
pub trait StorageInput: Read + Send {
    /// Total length of the file in bytes.
    fn len(&self) -> u64;
}

/// Abstract storage for index files.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Create a new file, replacing any previous file of the same name.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Atomically replace the contents of `name` with `data`.
    ///
    /// Readers observe either the old or the new contents, never a mix.
    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// List all file names in this storage.
    fn list_files(&self) -> Result<Vec<String>>;

    /// True if `name` exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;
}

/// Read an entire storage file into memory.
pub fn read_all(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let mut buf = Vec::with_capacity(input.len() as usize);
    input.read_to_end(&mut buf)?;
    Ok(buf)
}
