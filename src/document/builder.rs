//! # Document Construction
//!
//! `DocumentBuilder` assembles the field section incrementally and stamps
//! the u32 length prefix on `finish`. Field names are limited to 255 bytes
//! by the 1-byte name-length prefix; the total encoded size is limited to
//! `u32::MAX` by the length prefix. Both limits are checked as fields are
//! added, so `finish` itself cannot fail.

use eyre::{ensure, Result};

use crate::encoding::MAX_STRING_LEN;

use super::{Document, Value, DOCUMENT_LENGTH_PREFIX};

#[derive(Debug, Default)]
pub struct DocumentBuilder {
    body: Vec<u8>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    /// Appends a field. Accepts anything convertible to [`Value`], so
    /// `builder.field("awesome", true)` works for the common scalar types.
    pub fn field<'a, V: Into<Value<'a>>>(mut self, name: &str, value: V) -> Result<Self> {
        let value = value.into();
        ensure!(
            name.len() <= MAX_STRING_LEN,
            "field name too long: {} bytes (max {})",
            name.len(),
            MAX_STRING_LEN
        );

        let added = 1 + name.len() + value.encoded_len();
        let total = DOCUMENT_LENGTH_PREFIX + self.body.len() + added;
        ensure!(
            total <= u32::MAX as usize,
            "document too large: {total} bytes"
        );

        self.body.push(name.len() as u8);
        self.body.extend_from_slice(name.as_bytes());
        value.encode_into(&mut self.body);
        Ok(self)
    }

    pub fn finish(self) -> Document {
        let total = DOCUMENT_LENGTH_PREFIX + self.body.len();
        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&(total as u32).to_le_bytes());
        bytes.extend_from_slice(&self.body);
        Document { bytes }
    }
}
