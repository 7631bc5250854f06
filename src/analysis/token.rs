//! Token representation.

/// A single token produced by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized token text.
    pub text: String,
    /// Byte offset of the token start within the source text.
    pub offset_from: usize,
    /// Byte offset one past the token end within the source text.
    pub offset_to: usize,
    /// Token position within the field, used for phrase matching.
    /// Filters that drop tokens leave gaps rather than renumbering.
    pub position: u32,
}

impl Token {
    /// Create a token.
    pub fn new<S: Into<String>>(text: S, offset_from: usize, offset_to: usize, position: u32) -> Token {
        Token {
            text: text.into(),
            offset_from,
            offset_to,
            position,
        }
    }
}
