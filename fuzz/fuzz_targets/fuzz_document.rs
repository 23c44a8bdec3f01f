//! Fuzz testing for the document codec.
//!
//! Feeds the codec two ways: arbitrary raw bytes must never panic in
//! `Document::from_bytes`, and documents assembled through the builder must
//! validate, round-trip, and match themselves.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use kistdb::{Document, Value};

#[derive(Debug, Arbitrary)]
enum FieldValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Arbitrary)]
struct DocumentInput {
    raw: Vec<u8>,
    fields: Vec<(String, FieldValue)>,
}

fuzz_target!(|input: DocumentInput| {
    // Arbitrary bytes: must reject gracefully, never panic.
    let _ = Document::from_bytes(input.raw);

    // Built documents: must validate and round-trip.
    let mut builder = Document::builder();
    for (name, value) in &input.fields {
        let value = match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int32(v) => Value::Int32(*v),
            FieldValue::Int64(v) => Value::Int64(*v),
            FieldValue::Float64(v) => Value::Float64(*v),
            FieldValue::String(s) => Value::String(s),
            FieldValue::Binary(b) => Value::Binary(b),
        };
        match builder.field(name, value) {
            Ok(next) => builder = next,
            Err(_) => return, // overlong name; rejection is the contract
        }
    }

    let doc = builder.finish();
    let reparsed = Document::from_bytes(doc.as_bytes().to_vec()).expect("built document is valid");
    assert_eq!(reparsed.as_bytes(), doc.as_bytes());
});
