//! Shared utility modules used across fathom components.

pub mod varint;
