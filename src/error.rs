//! # Error Kinds
//!
//! Every fallible operation in the crate returns `eyre::Result`. The closed
//! set of failure kinds below is attached to the report at the point of
//! failure, so callers that need to branch on the kind can downcast:
//!
//! ```ignore
//! match db_result {
//!     Err(report) if StoreError::kind(&report) == Some(&StoreError::InvalidPage) => ...,
//!     ...
//! }
//! ```
//!
//! Context layered on top with `wrap_err` does not hide the kind; `kind`
//! walks the whole chain.

use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The database file cannot be created or opened.
    #[error("database file '{}' is not accessible", .0.display())]
    NotAccessible(PathBuf),

    /// The file is shorter than expected or the version prefix is
    /// unreadable or unsupported.
    #[error("invalid file structure")]
    InvalidFileStructure,

    /// A page failed structural validation: size or type discriminant
    /// mismatch, truncated buffer, or a chain pointing at the wrong type.
    #[error("invalid page")]
    InvalidPage,

    /// A referenced document is truncated or fails codec validation.
    #[error("invalid document")]
    InvalidDocument,

    /// A document reference carries a slot offset outside its page.
    #[error("invalid document reference")]
    InvalidDocumentReference,
}

impl StoreError {
    /// Extracts the failure kind from a report, if one was attached
    /// anywhere in its chain.
    pub fn kind(report: &eyre::Report) -> Option<&StoreError> {
        report.downcast_ref::<StoreError>()
    }
}
