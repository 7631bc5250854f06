//! Documents: ordered multimaps from field to typed values.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::facet::Facet;
use crate::schema::value::Value;
use crate::schema::{Field, Schema};

/// One `(field, value)` pair of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// The field ordinal.
    pub field: Field,
    /// The typed value.
    pub value: Value,
}

/// A document handed to the index writer.
///
/// A document is an ordered multimap: a field may repeat, and repeated values
/// are preserved in insertion order without deduplication. A document has no
/// identity before indexing; afterwards it is addressed by
/// `(segment ordinal, doc id)`, valid only within one reader snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    field_values: Vec<FieldValue>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Document {
        Document::default()
    }

    /// Append a typed value to a field.
    pub fn add_value<V: Into<Value>>(&mut self, field: Field, value: V) {
        self.field_values.push(FieldValue {
            field,
            value: value.into(),
        });
    }

    /// Append a text value.
    pub fn add_text<S: Into<String>>(&mut self, field: Field, text: S) {
        self.add_value(field, Value::Str(text.into()));
    }

    /// Append an unsigned integer value.
    pub fn add_u64(&mut self, field: Field, value: u64) {
        self.add_value(field, Value::U64(value));
    }

    /// Append a signed integer value.
    pub fn add_i64(&mut self, field: Field, value: i64) {
        self.add_value(field, Value::I64(value));
    }

    /// Append a float value.
    pub fn add_f64(&mut self, field: Field, value: f64) {
        self.add_value(field, Value::F64(value));
    }

    /// Append a boolean value.
    pub fn add_bool(&mut self, field: Field, value: bool) {
        self.add_value(field, Value::Bool(value));
    }

    /// Append a date value.
    pub fn add_date(&mut self, field: Field, value: DateTime<Utc>) {
        self.add_value(field, Value::Date(value));
    }

    /// Append a facet value.
    pub fn add_facet(&mut self, field: Field, facet: Facet) {
        self.add_value(field, Value::Facet(facet));
    }

    /// Append a bytes value.
    pub fn add_bytes(&mut self, field: Field, value: Vec<u8>) {
        self.add_value(field, Value::Bytes(value));
    }

    /// Append an IP address value.
    pub fn add_ip(&mut self, field: Field, addr: IpAddr) {
        self.add_value(field, Value::Ip(addr));
    }

    /// Append a JSON object value.
    pub fn add_json(&mut self, field: Field, value: serde_json::Value) {
        self.add_value(field, Value::Json(value));
    }

    /// All `(field, value)` pairs in insertion order.
    pub fn field_values(&self) -> &[FieldValue] {
        &self.field_values
    }

    /// All values of one field, in insertion order.
    pub fn get_all(&self, field: Field) -> impl Iterator<Item = &Value> {
        self.field_values
            .iter()
            .filter(move |fv| fv.field == field)
            .map(|fv| &fv.value)
    }

    /// The first value of a field, if any.
    pub fn get_first(&self, field: Field) -> Option<&Value> {
        self.get_all(field).next()
    }

    /// Number of `(field, value)` pairs.
    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    /// True if the document carries no values.
    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }

    /// Render the document as a field-name-keyed JSON object.
    ///
    /// Repeated fields become arrays of values, singletons stay scalar-ish
    /// (still wrapped in an array for predictability).
    pub fn to_named_json(&self, schema: &Schema) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for fv in &self.field_values {
            let name = schema.get_field_name(fv.field).to_string();
            let json_value = serde_json::to_value(&fv.value).unwrap_or(serde_json::Value::Null);
            match map.get_mut(&name) {
                Some(serde_json::Value::Array(values)) => values.push(json_value),
                _ => {
                    map.insert(name, serde_json::Value::Array(vec![json_value]));
                }
            }
        }
        serde_json::Value::Object(map)
    }
}
