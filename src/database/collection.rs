//! # Collection Facade
//!
//! High-level document operations over one collection's page chain. All
//! operations walk the chain front to back: the header page first, then
//! each linked body page, loaded on demand.
//!
//! Matching uses the document codec's equality predicate: a candidate
//! matches a filter iff every filter field is present on the candidate with
//! a binary-identical encoded value.

use eyre::{ensure, Result, WrapErr};

use crate::document::{Document, DOCUMENT_LENGTH_PREFIX};
use crate::encoding;
use crate::error::StoreError;
use crate::storage::{
    CollectionBodyPage, CollectionHeaderPage, DbFile, DocumentReference, PageReference, SlotPage,
};

use super::Database;

/// A handle to one collection. Borrows the database mutably, so only one
/// collection handle can be live at a time.
pub struct Collection<'db> {
    db: &'db mut Database,
    header: CollectionHeaderPage,
}

impl<'db> Collection<'db> {
    pub(crate) fn new(db: &'db mut Database, header: CollectionHeaderPage) -> Self {
        Self { db, header }
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }

    /// The collection's header page, e.g. for chain inspection.
    pub fn header(&self) -> &CollectionHeaderPage {
        &self.header
    }

    /// Appends a document at the tail of the collection.
    pub fn append(&mut self, document: &Document) -> Result<()> {
        self.header.append(&mut self.db.file, document.as_bytes())?;
        Ok(())
    }

    /// Number of reachable documents: the sum of each chain page's live
    /// slot count.
    pub fn count(&mut self) -> Result<u64> {
        let mut total = self.header.entry_count() as u64;
        let mut next = self.header.next_reference();
        while let Some(reference) = next {
            let body = CollectionBodyPage::resolve(&mut self.db.file, &reference)?;
            total += body.entry_count() as u64;
            next = body.next_reference();
        }
        Ok(total)
    }

    /// Replaces every document matching `filter` with `replacement`,
    /// returning how many were replaced. Documents that shrink or keep
    /// their size are rewritten in place; documents that grow are appended
    /// and their slot repointed.
    pub fn update(&mut self, filter: &Document, replacement: &Document) -> Result<usize> {
        let mut updated = update_page(&mut self.db.file, &mut self.header, filter, replacement)?;
        let mut next = self.header.next_reference();
        while let Some(reference) = next {
            let mut body = CollectionBodyPage::resolve(&mut self.db.file, &reference)?;
            updated += update_page(&mut self.db.file, &mut body, filter, replacement)?;
            next = body.next_reference();
        }
        Ok(updated)
    }

    /// Removes every document matching `filter` by zeroing its slot,
    /// returning how many were removed. The document bytes stay behind as
    /// dead space.
    pub fn remove(&mut self, filter: &Document) -> Result<usize> {
        let mut removed = remove_page(&mut self.db.file, &mut self.header, filter)?;
        let mut next = self.header.next_reference();
        while let Some(reference) = next {
            let mut body = CollectionBodyPage::resolve(&mut self.db.file, &reference)?;
            removed += remove_page(&mut self.db.file, &mut body, filter)?;
            next = body.next_reference();
        }
        Ok(removed)
    }

    /// Lazily yields every reachable document, front to back. The sequence
    /// is finite and non-restartable; call again for a fresh one. An error
    /// while resolving a document or a chain page terminates the sequence
    /// early.
    pub fn iterate(&mut self) -> Documents<'_> {
        let slots: Vec<u64> = self
            .header
            .entries()
            .map(|r| r.document_position)
            .collect();
        Documents {
            file: &mut self.db.file,
            slots: slots.into_iter(),
            next_page: self.header.next_reference(),
            done: false,
        }
    }
}

fn update_page<P: SlotPage>(
    file: &mut DbFile,
    page: &mut P,
    filter: &Document,
    replacement: &Document,
) -> Result<usize> {
    let references: Vec<DocumentReference> = page.entries().collect();
    let mut updated = 0;
    for reference in references {
        let document = read_document(file, reference.document_position)?;
        if document.matches(filter) {
            page.update(file, &reference, replacement.as_bytes())?;
            updated += 1;
        }
    }
    Ok(updated)
}

fn remove_page<P: SlotPage>(
    file: &mut DbFile,
    page: &mut P,
    filter: &Document,
) -> Result<usize> {
    let references: Vec<DocumentReference> = page.entries().collect();
    let mut removed = 0;
    for reference in references {
        let document = read_document(file, reference.document_position)?;
        if document.matches(filter) {
            page.remove(file, &reference)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Resolves a slot's file offset to a validated document. Truncation at
/// either read fails with `InvalidDocument`, as does codec validation.
pub(crate) fn read_document(file: &mut DbFile, position: u64) -> Result<Document> {
    let prefix = file
        .read_exact(position, DOCUMENT_LENGTH_PREFIX)
        .wrap_err(StoreError::InvalidDocument)?;
    let total = encoding::read_u32(&prefix, 0)? as usize;
    ensure!(total >= DOCUMENT_LENGTH_PREFIX, StoreError::InvalidDocument);

    let bytes = file
        .read_exact(position, total)
        .wrap_err(StoreError::InvalidDocument)?;
    Document::from_bytes(bytes)
        .wrap_err_with(|| format!("document at offset {position} failed validation"))
}

/// Lazy document sequence over one collection chain. Body pages are loaded
/// as the iteration reaches them.
pub struct Documents<'a> {
    file: &'a mut DbFile,
    slots: std::vec::IntoIter<u64>,
    next_page: Option<PageReference>,
    done: bool,
}

impl Iterator for Documents<'_> {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(position) = self.slots.next() {
                match read_document(self.file, position) {
                    Ok(document) => return Some(document),
                    Err(_) => {
                        self.done = true;
                        return None;
                    }
                }
            }

            let Some(reference) = self.next_page.take() else {
                self.done = true;
                return None;
            };
            match CollectionBodyPage::resolve(self.file, &reference) {
                Ok(body) => {
                    self.slots = body
                        .entries()
                        .map(|r| r.document_position)
                        .collect::<Vec<u64>>()
                        .into_iter();
                    self.next_page = body.next_reference();
                }
                Err(_) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(awesome: bool) -> Document {
        Document::builder().field("awesome", awesome).unwrap().finish()
    }

    #[test]
    fn append_and_count() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();
        let mut kaas = db.make_collection("kaas").unwrap();

        assert_eq!(kaas.count().unwrap(), 0);
        kaas.append(&doc(true)).unwrap();
        kaas.append(&doc(true)).unwrap();
        assert_eq!(kaas.count().unwrap(), 2);
    }

    #[test]
    fn iterate_is_fresh_each_call() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();
        let mut kaas = db.make_collection("kaas").unwrap();
        kaas.append(&doc(true)).unwrap();

        assert_eq!(kaas.iterate().count(), 1);
        assert_eq!(kaas.iterate().count(), 1);
    }

    #[test]
    fn update_returns_match_count() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();
        let mut kaas = db.make_collection("kaas").unwrap();
        kaas.append(&doc(true)).unwrap();
        kaas.append(&doc(false)).unwrap();
        kaas.append(&doc(true)).unwrap();

        let n = kaas.update(&doc(true), &doc(false)).unwrap();
        assert_eq!(n, 2);
        assert!(kaas.iterate().all(|d| d == doc(false)));
    }

    #[test]
    fn remove_returns_match_count() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();
        let mut kaas = db.make_collection("kaas").unwrap();
        kaas.append(&doc(false)).unwrap();
        kaas.append(&doc(false)).unwrap();

        assert_eq!(kaas.remove(&doc(false)).unwrap(), 2);
        assert_eq!(kaas.count().unwrap(), 0);
    }
}
