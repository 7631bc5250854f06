//! Order-preserving term encoding.
//!
//! A term is `(field ordinal, value-type discriminant, serialized value
//! bytes)`. The term dictionary orders terms byte-lexicographically over this
//! serialized form, so numeric, date, and IP values go through monotonic bit
//! transforms that make byte order agree with value order. That property is
//! what makes range queries a contiguous dictionary scan.

use std::net::{IpAddr, Ipv6Addr};

use chrono::{DateTime, Utc};

use crate::schema::facet::Facet;
use crate::schema::{Field, FieldType};

/// Type discriminant byte embedded in every term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeCode {
    Text = 0,
    U64 = 1,
    I64 = 2,
    F64 = 3,
    Bool = 4,
    Date = 5,
    Facet = 6,
    Bytes = 7,
    Ip = 8,
    Json = 9,
}

impl TypeCode {
    /// The discriminant for a declared field type.
    pub fn for_field_type(field_type: FieldType) -> TypeCode {
        match field_type {
            FieldType::Text => TypeCode::Text,
            FieldType::U64 => TypeCode::U64,
            FieldType::I64 => TypeCode::I64,
            FieldType::F64 => TypeCode::F64,
            FieldType::Bool => TypeCode::Bool,
            FieldType::Date => TypeCode::Date,
            FieldType::Facet => TypeCode::Facet,
            FieldType::Bytes => TypeCode::Bytes,
            FieldType::Ip => TypeCode::Ip,
            FieldType::Json => TypeCode::Json,
        }
    }
}

/// Map an i64 onto a u64 preserving order (sign-flipped two's complement).
pub fn i64_to_u64(value: i64) -> u64 {
    (value as u64) ^ (1u64 << 63)
}

/// Inverse of [`i64_to_u64`].
pub fn u64_to_i64(value: u64) -> i64 {
    (value ^ (1u64 << 63)) as i64
}

/// Map an f64 onto a u64 preserving order (monotonic bit transform).
///
/// Positive floats get their sign bit set; negative floats are bitwise
/// inverted, reversing their order into ascending byte order.
pub fn f64_to_u64(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & (1u64 << 63) == 0 {
        bits | (1u64 << 63)
    } else {
        !bits
    }
}

/// Inverse of [`f64_to_u64`].
pub fn u64_to_f64(value: u64) -> f64 {
    let bits = if value & (1u64 << 63) != 0 {
        value & !(1u64 << 63)
    } else {
        !value
    };
    f64::from_bits(bits)
}

/// Nanosecond timestamp of a date value, saturating at the i64 range.
pub fn date_to_i64(value: DateTime<Utc>) -> i64 {
    value.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Normalize an IP address into the 128-bit v6 space (v4 becomes v4-mapped).
pub fn ip_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(v4.to_ipv6_mapped()),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Inverse of [`ip_to_u128`]; v4-mapped addresses come back as `IpAddr::V6`
/// since the normalized form is canonical inside the engine.
pub fn u128_to_ip(value: u128) -> IpAddr {
    IpAddr::V6(Ipv6Addr::from(value))
}

/// An encoded term: the unit of the term dictionary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Term {
    // Layout: 4 bytes big-endian field ordinal, 1 type code byte, value bytes.
    bytes: Vec<u8>,
}

impl Term {
    fn with_capacity(field: Field, code: TypeCode, value_len: usize) -> Term {
        let mut bytes = Vec::with_capacity(5 + value_len);
        bytes.extend_from_slice(&field.0.to_be_bytes());
        bytes.push(code as u8);
        Term { bytes }
    }

    /// A text term. The text must already be analyzer output.
    pub fn from_field_text(field: Field, text: &str) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::Text, text.len());
        term.bytes.extend_from_slice(text.as_bytes());
        term
    }

    /// A u64 term.
    pub fn from_field_u64(field: Field, value: u64) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::U64, 8);
        term.bytes.extend_from_slice(&value.to_be_bytes());
        term
    }

    /// An i64 term (sign-flipped so byte order matches value order).
    pub fn from_field_i64(field: Field, value: i64) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::I64, 8);
        term.bytes.extend_from_slice(&i64_to_u64(value).to_be_bytes());
        term
    }

    /// An f64 term (monotonic bit transform).
    pub fn from_field_f64(field: Field, value: f64) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::F64, 8);
        term.bytes.extend_from_slice(&f64_to_u64(value).to_be_bytes());
        term
    }

    /// A boolean term.
    pub fn from_field_bool(field: Field, value: bool) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::Bool, 1);
        term.bytes.push(value as u8);
        term
    }

    /// A date term (nanosecond timestamp, sign-flipped).
    pub fn from_field_date(field: Field, value: DateTime<Utc>) -> Term {
        let nanos = date_to_i64(value);
        let mut term = Term::with_capacity(field, TypeCode::Date, 8);
        term.bytes
            .extend_from_slice(&i64_to_u64(nanos).to_be_bytes());
        term
    }

    /// A facet term; ancestry maps onto byte-prefix containment.
    pub fn from_field_facet(field: Field, facet: &Facet) -> Term {
        let encoded = facet.encoded_bytes();
        let mut term = Term::with_capacity(field, TypeCode::Facet, encoded.len());
        term.bytes.extend_from_slice(encoded);
        term
    }

    /// A bytes term.
    pub fn from_field_bytes(field: Field, value: &[u8]) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::Bytes, value.len());
        term.bytes.extend_from_slice(value);
        term
    }

    /// An IP term (128-bit normalized form, big-endian).
    pub fn from_field_ip(field: Field, addr: IpAddr) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::Ip, 16);
        term.bytes
            .extend_from_slice(&ip_to_u128(addr).to_be_bytes());
        term
    }

    /// A JSON leaf term: text tokens extracted from JSON scalar leaves.
    pub fn from_field_json_text(field: Field, text: &str) -> Term {
        let mut term = Term::with_capacity(field, TypeCode::Json, text.len());
        term.bytes.extend_from_slice(text.as_bytes());
        term
    }

    /// Rebuild a term from its serialized form.
    pub fn from_bytes(bytes: Vec<u8>) -> Term {
        debug_assert!(bytes.len() >= 5);
        Term { bytes }
    }

    /// The field ordinal this term belongs to.
    pub fn field(&self) -> Field {
        let mut ord = [0u8; 4];
        ord.copy_from_slice(&self.bytes[0..4]);
        Field(u32::from_be_bytes(ord))
    }

    /// The type discriminant byte.
    pub fn type_code(&self) -> u8 {
        self.bytes[4]
    }

    /// The serialized value portion.
    pub fn value_bytes(&self) -> &[u8] {
        &self.bytes[5..]
    }

    /// The text of a text or JSON term, if valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(self.value_bytes()).ok()
    }

    /// The full serialized term.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The 5-byte `(field, type)` prefix shared by all terms of a field.
    pub fn field_prefix(field: Field, code: TypeCode) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(5);
        prefix.extend_from_slice(&field.0.to_be_bytes());
        prefix.push(code as u8);
        prefix
    }
}
