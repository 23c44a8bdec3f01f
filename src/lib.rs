//! # KistDB - Single-File Embedded Document Store
//!
//! KistDB persists self-describing binary documents into named collections,
//! keeping all durable state in one file per database. The file is a
//! sequence of fixed-size pages linked into a master directory and
//! per-collection chains, with document payloads appended between them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use kistdb::{Database, Document};
//!
//! let mut db = Database::open("/tmp/db1")?;
//! let mut kaas = db.make_collection("kaas")?;
//!
//! kaas.append(&Document::builder().field("awesome", true)?.finish())?;
//!
//! let filter = Document::builder().field("awesome", true)?.finish();
//! for doc in kaas.iterate() {
//!     assert!(doc.matches(&filter));
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Database / Collection facades     │
//! ├─────────────────────────────────────┤
//! │   Master & collection page chains   │
//! ├─────────────────────────────────────┤
//! │   Page layout & validation          │
//! ├─────────────────────────────────────┤
//! │   Positioned file I/O (DbFile)      │
//! └─────────────────────────────────────┘
//! ```
//!
//! The document codec (`document`) sits beside the stack: pages reference
//! documents only by file offset and the store interprets nothing beyond
//! the 4-byte length prefix.
//!
//! ## Guarantees and Limits
//!
//! - Single writer, single reader, one thread; no internal locking.
//! - Pages are never freed, moved, or shrunk; removed documents leave dead
//!   space behind.
//! - Writes are payload-first, so a torn write sequence leaves unreachable
//!   bytes rather than dangling references. No fsync is issued.
//! - Iteration stops at the first empty slot of each page, so removing a
//!   non-tail document truncates that page's visible tail.
//!
//! ## Module Overview
//!
//! - [`database`]: `Database` and `Collection` facades
//! - [`document`]: self-describing document codec
//! - [`storage`]: file backend, page layout, master and collection chains
//! - [`encoding`]: little-endian primitives
//! - [`error`]: the closed set of failure kinds

pub mod database;
pub mod document;
pub mod encoding;
pub mod error;
pub mod storage;

pub use database::{Collection, Database, Documents};
pub use document::{Document, DocumentBuilder, Value};
pub use error::StoreError;
