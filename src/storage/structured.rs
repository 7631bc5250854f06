//! Structured binary readers and writers.
//!
//! All binary segment files are written through [`StructWriter`], which
//! tracks the write position and maintains a running CRC32 that is appended
//! as a footer on close. [`StructReader`] verifies the footer before
//! exposing the body, so truncation and corruption surface as
//! [`FathomError::Corrupted`] at open time rather than as garbage data.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FathomError, Result};
use crate::storage::StorageOutput;
use crate::util::varint;

/// A checksumming writer for structured binary files.
pub struct StructWriter {
    out: Box<dyn StorageOutput>,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl StructWriter {
    /// Wrap a storage output.
    pub fn new(out: Box<dyn StorageOutput>) -> StructWriter {
        StructWriter {
            out,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        use std::io::Write;
        self.out.write_all(buf)?;
        self.hasher.update(buf);
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Current byte position (excluding the eventual footer).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_raw(&buf)
    }

    /// Write a little-endian u64.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write_raw(&buf)
    }

    /// Write a little-endian f64.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, value);
        self.write_raw(&buf)
    }

    /// Write a variable-length u64.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(10);
        varint::encode_u64(value, &mut buf);
        self.write_raw(&buf)
    }

    /// Write raw bytes (caller frames the length).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_raw(bytes)
    }

    /// Write a length-prefixed byte slice.
    pub fn write_len_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, text: &str) -> Result<()> {
        self.write_len_bytes(text.as_bytes())
    }

    /// Append the CRC32 footer and seal the file.
    pub fn close(mut self) -> Result<()> {
        use std::io::Write;
        let crc = self.hasher.clone().finalize();
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, crc);
        self.out.write_all(&buf)?;
        self.out.close()
    }
}

/// A position-tracked reader over a checksummed file body.
///
/// The underlying buffer is shared, so [`StructReader::fork`] hands out
/// additional cursors into an already-verified file for free.
#[derive(Clone)]
pub struct StructReader {
    data: std::sync::Arc<Vec<u8>>,
    pos: usize,
    body_len: usize,
}

impl StructReader {
    /// Verify the CRC32 footer of `data` and open a reader over the body.
    pub fn open(data: Vec<u8>) -> Result<StructReader> {
        if data.len() < 4 {
            return Err(FathomError::corrupted("File too short for checksum footer"));
        }
        let body_len = data.len() - 4;
        let expected = LittleEndian::read_u32(&data[body_len..]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[..body_len]);
        let actual = hasher.finalize();
        if expected != actual {
            return Err(FathomError::corrupted(format!(
                "Checksum mismatch: expected {expected:08x}, computed {actual:08x}"
            )));
        }
        Ok(StructReader {
            data: std::sync::Arc::new(data),
            pos: 0,
            body_len,
        })
    }

    /// A fresh cursor over the same verified body, positioned at `offset`.
    pub fn fork(&self, offset: usize) -> Result<StructReader> {
        let mut reader = self.clone();
        reader.seek(offset)?;
        Ok(reader)
    }

    /// Length of the file body (excluding the checksum footer).
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Jump to an absolute body position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.body_len {
            return Err(FathomError::corrupted("Seek past end of file body"));
        }
        self.pos = pos;
        Ok(())
    }

    /// Bytes remaining in the body.
    pub fn remaining(&self) -> usize {
        self.body_len - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(FathomError::corrupted("Unexpected end of file body"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Read a little-endian f64.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Read a variable-length u64.
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = varint::decode_u64(&self.data[self.pos..self.body_len])?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Read a length-prefixed byte slice.
    pub fn read_len_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_len_bytes()?;
        String::from_utf8(bytes).map_err(|_| FathomError::corrupted("Invalid UTF-8 string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::{Storage, read_all};

    #[test]
    fn test_struct_round_trip() {
        let storage = MemoryStorage::new();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        writer.write_u8(7).unwrap();
        writer.write_u32(1234).unwrap();
        writer.write_u64(u64::MAX).unwrap();
        writer.write_f64(-2.5).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_string("postings").unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::open(read_all(&storage, "f").unwrap()).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u32().unwrap(), 1234);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_f64().unwrap(), -2.5);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "postings");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_corruption_detected() {
        let storage = MemoryStorage::new();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        writer.write_u64(42).unwrap();
        writer.close().unwrap();

        let mut data = read_all(&storage, "f").unwrap();
        data[3] ^= 0xFF;
        assert!(matches!(
            StructReader::open(data),
            Err(FathomError::Corrupted(_))
        ));
    }

    #[test]
    fn test_truncation_detected() {
        assert!(StructReader::open(vec![1, 2]).is_err());
    }

    #[test]
    fn test_position_tracking() {
        let storage = MemoryStorage::new();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        writer.write_u64(1).unwrap();
        assert_eq!(writer.position(), 8);
        writer.write_u8(2).unwrap();
        assert_eq!(writer.position(), 9);
        writer.close().unwrap();

        let mut reader = StructReader::open(read_all(&storage, "f").unwrap()).unwrap();
        reader.seek(8).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 2);
        assert!(reader.seek(100).is_err());
    }
}
