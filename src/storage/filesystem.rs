//! Local-directory storage backend with memory-mapped reads.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use memmap2::Mmap;

use crate::error::{FathomError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Storage rooted at a local directory.
///
/// Writes go through buffered files that are fsynced on close; the manifest
/// and deletion bitmaps use write-to-temp-then-rename for atomic replacement.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open (creating if needed) a directory-backed storage.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<FsStorage> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FsStorage { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // Storage names are flat; anything path-like is a caller bug.
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(FathomError::index(format!("Invalid storage name: {name}")));
        }
        Ok(self.root.join(name))
    }
}

impl Storage for FsStorage {
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.path_for(name)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Box::new(FsOutput {
            writer: BufWriter::new(file),
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let path = self.path_for(name)?;
        let file = File::open(&path)
            .map_err(|e| FathomError::index(format!("File not found: {name}: {e}")))?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Box::new(EmptyInput));
        }
        // Safety contract: segment files are sealed before they are opened
        // for reading and are never mutated in place afterwards.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Box::new(FsInput { mmap, pos: 0 }))
    }

    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        let tmp_path = self.root.join(format!(".tmp-{name}"));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
                && !name.starts_with(".tmp-")
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct FsOutput {
    writer: BufWriter<File>,
}

impl Write for FsOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FsOutput {
    fn close(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

struct FsInput {
    mmap: Mmap,
    pos: usize,
}

impl Read for FsInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.mmap[self.pos.min(self.mmap.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl StorageInput for FsInput {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }
}

struct EmptyInput;

impl Read for EmptyInput {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(0)
    }
}

impl StorageInput for EmptyInput {
    fn len(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_all;

    #[test]
    fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();

        let mut out = storage.create_output("seg.post").unwrap();
        out.write_all(b"postings").unwrap();
        out.close().unwrap();

        assert_eq!(read_all(&storage, "seg.post").unwrap(), b"postings");
        assert!(storage.list_files().unwrap().contains(&"seg.post".to_string()));

        storage.delete_file("seg.post").unwrap();
        assert!(!storage.file_exists("seg.post"));
    }

    #[test]
    fn test_atomic_write_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();

        storage.atomic_write("meta.json", b"{\"v\":1}").unwrap();
        storage.atomic_write("meta.json", b"{\"v\":2}").unwrap();
        assert_eq!(read_all(&storage, "meta.json").unwrap(), b"{\"v\":2}");
        // No temp files left behind.
        assert_eq!(storage.list_files().unwrap(), vec!["meta.json".to_string()]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        assert!(storage.create_output("../escape").is_err());
        assert!(storage.open_input("a/b").is_err());
    }
}
