//! Posting lists: per-term document occurrence data.
//!
//! A posting list records, for one term, the ids of the documents containing
//! it (sorted ascending), the term frequency within each document, and the
//! token positions used for phrase matching. On disk, doc ids and positions
//! are delta-encoded varints.

use crate::error::{FathomError, Result};
use crate::storage::structured::{StructReader, StructWriter};

/// A within-segment document id. Dense in `[0, max_doc)` per segment.
pub type DocId = u32;

/// One document entry within a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// The document id.
    pub doc_id: DocId,
    /// Number of occurrences of the term in the document.
    pub term_freq: u32,
    /// Token positions of each occurrence (empty for non-positional fields).
    pub positions: Vec<u32>,
}

/// A fully decoded posting list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    /// Entries sorted by ascending doc id.
    pub postings: Vec<Posting>,
    /// Total term frequency across all documents.
    pub total_term_freq: u64,
}

impl PostingList {
    /// Number of documents containing the term.
    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    /// Serialize into a structured writer.
    pub fn encode(&self, writer: &mut StructWriter) -> Result<()> {
        writer.write_varint(self.postings.len() as u64)?;
        let mut last_doc = 0u32;
        for (idx, posting) in self.postings.iter().enumerate() {
            let delta = if idx == 0 {
                posting.doc_id
            } else {
                posting.doc_id - last_doc
            };
            writer.write_varint(delta as u64)?;
            writer.write_varint(posting.term_freq as u64)?;
            writer.write_varint(posting.positions.len() as u64)?;
            let mut last_pos = 0u32;
            for (pidx, &pos) in posting.positions.iter().enumerate() {
                let pdelta = if pidx == 0 { pos } else { pos - last_pos };
                writer.write_varint(pdelta as u64)?;
                last_pos = pos;
            }
            last_doc = posting.doc_id;
        }
        Ok(())
    }

    /// Decode from a structured reader positioned at a posting list.
    pub fn decode(reader: &mut StructReader) -> Result<PostingList> {
        let doc_count = reader.read_varint()? as usize;
        let mut postings = Vec::with_capacity(doc_count);
        let mut total_term_freq = 0u64;
        let mut last_doc = 0u32;
        for idx in 0..doc_count {
            let delta = reader.read_varint()? as u32;
            let doc_id = if idx == 0 { delta } else { last_doc + delta };
            let term_freq = reader.read_varint()? as u32;
            let num_positions = reader.read_varint()? as usize;
            let mut positions = Vec::with_capacity(num_positions);
            let mut last_pos = 0u32;
            for pidx in 0..num_positions {
                let pdelta = reader.read_varint()? as u32;
                let pos = if pidx == 0 { pdelta } else { last_pos + pdelta };
                positions.push(pos);
                last_pos = pos;
            }
            postings.push(Posting {
                doc_id,
                term_freq,
                positions,
            });
            total_term_freq += term_freq as u64;
            last_doc = doc_id;
        }
        Ok(PostingList {
            postings,
            total_term_freq,
        })
    }
}

/// Incremental builder used by the segment writer.
///
/// Occurrences must arrive with non-decreasing doc ids; within a doc they
/// arrive in position order.
#[derive(Debug, Default)]
pub struct PostingListBuilder {
    list: PostingList,
}

impl PostingListBuilder {
    /// Create an empty builder.
    pub fn new() -> PostingListBuilder {
        PostingListBuilder::default()
    }

    /// Record one occurrence of the term.
    pub fn add_occurrence(&mut self, doc_id: DocId, position: Option<u32>) -> Result<()> {
        match self.list.postings.last_mut() {
            Some(last) if last.doc_id == doc_id => {
                last.term_freq += 1;
                if let Some(pos) = position {
                    last.positions.push(pos);
                }
            }
            Some(last) if last.doc_id > doc_id => {
                return Err(FathomError::index(format!(
                    "Out-of-order doc id {doc_id} after {}",
                    last.doc_id
                )));
            }
            _ => {
                self.list.postings.push(Posting {
                    doc_id,
                    term_freq: 1,
                    positions: position.into_iter().collect(),
                });
            }
        }
        self.list.total_term_freq += 1;
        Ok(())
    }

    /// Number of documents recorded so far.
    pub fn doc_freq(&self) -> u32 {
        self.list.doc_freq()
    }

    /// Finish building.
    pub fn build(self) -> PostingList {
        self.list
    }
}
