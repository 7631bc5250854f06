//! Hierarchical facet paths.
//!
//! A facet is a `/`-delimited category path such as `/books/fiction`. Facets
//! are indexed as specially-encoded terms whose byte representation makes
//! ancestry a prefix relation: facet A is an ancestor of facet B iff A's
//! encoded form is a proper prefix of B's. Each path step is terminated by a
//! `\0` byte, so `/a` (`a\0`) is a prefix of `/a/b` (`a\0b\0`) but not of
//! `/ab` (`ab\0`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FathomError, Result};

/// Separator byte between encoded path steps.
pub const FACET_SEP: u8 = 0u8;

/// A hierarchical facet path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Facet {
    // Steps joined and terminated by `\0`; empty for the root facet.
    encoded: String,
}

impl Facet {
    /// The root facet `/`, ancestor of every other facet.
    pub fn root() -> Facet {
        Facet {
            encoded: String::new(),
        }
    }

    /// Parse a facet from its `/`-delimited path representation.
    ///
    /// The path must start with `/`; empty steps are rejected.
    pub fn from_text(path: &str) -> Result<Facet> {
        if !path.starts_with('/') {
            return Err(FathomError::schema(format!(
                "Facet path must start with '/': `{path}`"
            )));
        }
        if path == "/" {
            return Ok(Facet::root());
        }
        let mut encoded = String::new();
        for step in path[1..].split('/') {
            if step.is_empty() {
                return Err(FathomError::schema(format!(
                    "Facet path contains an empty step: `{path}`"
                )));
            }
            if step.contains('\0') {
                return Err(FathomError::schema("Facet steps may not contain NUL"));
            }
            encoded.push_str(step);
            encoded.push('\0');
        }
        Ok(Facet { encoded })
    }

    /// Build a facet from its encoded byte form (term dictionary side).
    pub fn from_encoded(bytes: &[u8]) -> Result<Facet> {
        let encoded = String::from_utf8(bytes.to_vec())
            .map_err(|_| FathomError::corrupted("Facet encoding is not valid UTF-8"))?;
        Ok(Facet { encoded })
    }

    /// The encoded byte form used in terms.
    pub fn encoded_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    /// True if this facet is the root `/`.
    pub fn is_root(&self) -> bool {
        self.encoded.is_empty()
    }

    /// The path steps of this facet.
    pub fn steps(&self) -> Vec<&str> {
        if self.is_root() {
            return Vec::new();
        }
        self.encoded.split_terminator('\0').collect()
    }

    /// True if this facet is an ancestor of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &Facet) -> bool {
        other.encoded.starts_with(&self.encoded)
    }

    /// The `/`-delimited path representation.
    pub fn to_path_string(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        let mut out = String::new();
        for step in self.steps() {
            out.push('/');
            out.push_str(step);
        }
        out
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_string())
    }
}

impl TryFrom<String> for Facet {
    type Error = FathomError;

    fn try_from(path: String) -> Result<Facet> {
        Facet::from_text(&path)
    }
}

impl From<Facet> for String {
    fn from(facet: Facet) -> String {
        facet.to_path_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_parse_and_display() {
        let facet = Facet::from_text("/books/fiction").unwrap();
        assert_eq!(facet.steps(), vec!["books", "fiction"]);
        assert_eq!(facet.to_string(), "/books/fiction");

        assert_eq!(Facet::root().to_string(), "/");
        assert!(Facet::from_text("books").is_err());
        assert!(Facet::from_text("/books//fiction").is_err());
    }

    #[test]
    fn test_prefix_containment() {
        let a = Facet::from_text("/a").unwrap();
        let ab = Facet::from_text("/a/b").unwrap();
        let ab_flat = Facet::from_text("/ab").unwrap();

        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(Facet::root().is_prefix_of(&ab));
        assert!(Facet::root().is_prefix_of(&a));
        // `/a` must not claim `/ab` as a descendant.
        assert!(!a.is_prefix_of(&ab_flat));
    }

    #[test]
    fn test_encoded_round_trip() {
        let facet = Facet::from_text("/x/y/z").unwrap();
        let restored = Facet::from_encoded(facet.encoded_bytes()).unwrap();
        assert_eq!(facet, restored);
    }
}
