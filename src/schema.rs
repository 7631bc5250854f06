//! Schema definition for fathom indexes.
//!
//! A [`Schema`] declares the fields of an index: their names, value types,
//! and per-field indexing options. It is immutable once built and is stored
//! in the index manifest; every lower layer refers to fields by their stable
//! integer ordinal ([`Field`]) rather than by name.
//!
//! # Modules
//!
//! - [`document`]: the typed document multimap handed to the writer
//! - [`facet`]: hierarchical `/`-delimited category paths
//! - [`term`]: order-preserving term encoding for the term dictionary
//! - [`value`]: the typed field value enum

pub mod document;
pub mod facet;
pub mod term;
pub mod value;

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{FathomError, Result};

pub use document::Document;
pub use facet::Facet;
pub use term::Term;
pub use value::Value;

/// A field identifier: a stable integer ordinal assigned at schema build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Field(pub u32);

impl Field {
    /// The ordinal of this field within its schema.
    pub fn ord(&self) -> u32 {
        self.0
    }
}

/// The value type declared for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Tokenized text.
    Text,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// 64-bit float.
    F64,
    /// Boolean.
    Bool,
    /// Nanosecond-precision UTC timestamp.
    Date,
    /// Hierarchical facet path.
    Facet,
    /// Raw bytes.
    Bytes,
    /// IP address (v4 normalized into the v6-mapped space).
    Ip,
    /// Dynamically typed JSON object.
    Json,
}

impl FieldType {
    /// Whether values of this type have a total order under the term
    /// encoding, making them valid range-query targets.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            FieldType::U64 | FieldType::I64 | FieldType::F64 | FieldType::Date | FieldType::Ip
        )
    }

    /// Whether a value matches this declared type.
    ///
    /// `Json` fields accept any value kind (dynamic typing); every other
    /// field type requires the exact matching value kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Text => matches!(value, Value::Str(_)),
            FieldType::U64 => matches!(value, Value::U64(_)),
            FieldType::I64 => matches!(value, Value::I64(_)),
            FieldType::F64 => matches!(value, Value::F64(_)),
            FieldType::Bool => matches!(value, Value::Bool(_)),
            FieldType::Date => matches!(value, Value::Date(_)),
            FieldType::Facet => matches!(value, Value::Facet(_)),
            FieldType::Bytes => matches!(value, Value::Bytes(_)),
            FieldType::Ip => matches!(value, Value::Ip(_)),
            FieldType::Json => true,
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::U64 => "u64",
            FieldType::I64 => "i64",
            FieldType::F64 => "f64",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::Facet => "facet",
            FieldType::Bytes => "bytes",
            FieldType::Ip => "ip",
            FieldType::Json => "json",
        }
    }
}

/// Per-field indexing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Whether the original value is stored and retrievable verbatim.
    #[serde(default = "default_true")]
    pub stored: bool,

    /// Whether the field is indexed (searchable via postings).
    #[serde(default = "default_true")]
    pub indexed: bool,

    /// Whether the field gets a columnar fast-field array for
    /// sorting, range scans, and aggregation.
    #[serde(default)]
    pub fast: bool,

    /// Analyzer name for text fields. `None` means the index default.
    #[serde(default)]
    pub tokenizer: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            stored: true,
            indexed: true,
            fast: false,
            tokenizer: None,
        }
    }
}

impl FieldOptions {
    /// Options for a stored + indexed field (the default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the field as fast (columnar).
    pub fn fast(mut self) -> Self {
        self.fast = true;
        self
    }

    /// Mark the field as not stored.
    pub fn unstored(mut self) -> Self {
        self.stored = false;
        self
    }

    /// Mark the field as not indexed.
    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// Set the analyzer name (text fields only).
    pub fn with_tokenizer<S: Into<String>>(mut self, name: S) -> Self {
        self.tokenizer = Some(name.into());
        self
    }
}

/// A single field declaration: name, value type, and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    /// The field name, unique within the schema.
    pub name: String,
    /// The declared value type.
    pub field_type: FieldType,
    /// Indexing options.
    pub options: FieldOptions,
}

/// An immutable index schema.
///
/// Cheap to clone; the field table is shared behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldEntry>", into = "Vec<FieldEntry>")]
pub struct Schema {
    entries: Arc<Vec<FieldEntry>>,
    by_name: Arc<AHashMap<String, Field>>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Schema {
    /// Create a schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a field by name.
    pub fn get_field(&self, name: &str) -> Result<Field> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| FathomError::query(format!("Field `{name}` is not defined in the schema")))
    }

    /// Look up the entry for a field ordinal.
    ///
    /// Panics if the ordinal does not belong to this schema; ordinals are
    /// only ever produced by this schema's own lookups.
    pub fn get_field_entry(&self, field: Field) -> &FieldEntry {
        &self.entries[field.0 as usize]
    }

    /// The name of a field.
    pub fn get_field_name(&self, field: Field) -> &str {
        &self.get_field_entry(field).name
    }

    /// Iterate over `(Field, &FieldEntry)` pairs in ordinal order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(ord, entry)| (Field(ord as u32), entry))
    }

    /// Number of declared fields.
    pub fn num_fields(&self) -> usize {
        self.entries.len()
    }
}

impl TryFrom<Vec<FieldEntry>> for Schema {
    type Error = FathomError;

    fn try_from(entries: Vec<FieldEntry>) -> Result<Schema> {
        let mut by_name = AHashMap::with_capacity(entries.len());
        for (ord, entry) in entries.iter().enumerate() {
            if by_name
                .insert(entry.name.clone(), Field(ord as u32))
                .is_some()
            {
                return Err(FathomError::schema(format!(
                    "Duplicate field name `{}`",
                    entry.name
                )));
            }
        }
        Ok(Schema {
            entries: Arc::new(entries),
            by_name: Arc::new(by_name),
        })
    }
}

impl From<Schema> for Vec<FieldEntry> {
    fn from(schema: Schema) -> Vec<FieldEntry> {
        schema.entries.as_ref().clone()
    }
}

/// Builder for [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    entries: Vec<FieldEntry>,
}

impl SchemaBuilder {
    /// Add a field with an explicit type and options. Returns its ordinal.
    pub fn add_field<S: Into<String>>(
        &mut self,
        name: S,
        field_type: FieldType,
        options: FieldOptions,
    ) -> Field {
        let field = Field(self.entries.len() as u32);
        self.entries.push(FieldEntry {
            name: name.into(),
            field_type,
            options,
        });
        field
    }

    /// Add a text field.
    pub fn add_text_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Text, options)
    }

    /// Add an unsigned integer field.
    pub fn add_u64_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::U64, options)
    }

    /// Add a signed integer field.
    pub fn add_i64_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::I64, options)
    }

    /// Add a float field.
    pub fn add_f64_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::F64, options)
    }

    /// Add a boolean field.
    pub fn add_bool_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Bool, options)
    }

    /// Add a date field (nanosecond-precision UTC timestamp).
    pub fn add_date_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Date, options)
    }

    /// Add a facet field. Facets are always indexed.
    pub fn add_facet_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        let options = FieldOptions {
            indexed: true,
            ..options
        };
        self.add_field(name, FieldType::Facet, options)
    }

    /// Add a bytes field.
    pub fn add_bytes_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Bytes, options)
    }

    /// Add an IP address field.
    pub fn add_ip_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Ip, options)
    }

    /// Add a JSON object field.
    pub fn add_json_field<S: Into<String>>(&mut self, name: S, options: FieldOptions) -> Field {
        self.add_field(name, FieldType::Json, options)
    }

    /// Build the schema. Fails on duplicate field names.
    pub fn build(self) -> Result<Schema> {
        Schema::try_from(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder_ordinals() {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", FieldOptions::default());
        let count = builder.add_u64_field("count", FieldOptions::default().fast());
        let schema = builder.build().unwrap();

        assert_eq!(title, Field(0));
        assert_eq!(count, Field(1));
        assert_eq!(schema.get_field("title").unwrap(), title);
        assert_eq!(schema.get_field_entry(count).field_type, FieldType::U64);
        assert!(schema.get_field_entry(count).options.fast);
        assert!(schema.get_field("missing").is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut builder = Schema::builder();
        builder.add_text_field("title", FieldOptions::default());
        builder.add_u64_field("title", FieldOptions::default());
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_schema_json_round_trip() {
        let mut builder = Schema::builder();
        builder.add_text_field("body", FieldOptions::default().with_tokenizer("simple"));
        builder.add_date_field("published", FieldOptions::default().fast());
        let schema = builder.build().unwrap();

        let json = serde_json::to_string(&schema).unwrap();
        let restored: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, restored);
    }

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::Text.accepts(&Value::Str("x".to_string())));
        assert!(!FieldType::U64.accepts(&Value::I64(-1)));
        assert!(FieldType::Json.accepts(&Value::U64(7)));
        assert!(FieldType::Ip.accepts(&Value::Ip("127.0.0.1".parse().unwrap())));
    }
}
