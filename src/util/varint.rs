//! Variable-length integer encoding utilities.
//!
//! Postings, stored documents, and dictionary tables use LEB128-style
//! variable-length encoding for compact doc-id deltas and counts.

use crate::error::{FathomError, Result};

/// Encode a u64 value using variable-length encoding, appending to `out`.
pub fn encode_u64(value: u64, out: &mut Vec<u8>) {
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }
}

/// Decode a u64 value from variable-length encoding.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;
    let mut bytes_read = 0;

    for &byte in bytes {
        bytes_read += 1;

        if shift >= 64 {
            return Err(FathomError::corrupted("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, bytes_read));
        }

        shift += 7;
    }

    Err(FathomError::corrupted("Incomplete VarInt"))
}
