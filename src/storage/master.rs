//! # Master Directory Chain
//!
//! The first page of every database file is a master page: a directory of
//! 10-byte entries, each referencing one collection header page. When a
//! master page's entry array fills up, a fresh master page is appended at
//! end-of-file and linked through the `next` pointer, forming a chain.
//!
//! ## Body Layout
//!
//! ```text
//! offset 10            entry 0:  size (1) | type (1) | file offset (8 LE)
//! offset 20            entry 1
//! ...                  up to 99 entries per Small page
//! ```
//!
//! A zero file offset marks an unused entry and terminates iteration.
//! Entries are never removed once set.

use eyre::{ensure, Result};

use crate::error::StoreError;

use super::collection_page::CollectionHeaderPage;
use super::page::{PageBuf, PageReference, PageSize, PageType};
use super::{DbFile, MASTER_ENTRY_SIZE, PAGE_HEADER_SIZE};

#[derive(Debug, Clone)]
pub struct MasterPage {
    page: PageBuf,
}

impl MasterPage {
    /// A fresh, empty Small master page (not yet on disk).
    pub fn new() -> Self {
        Self {
            page: PageBuf::new(PageSize::Small, PageType::Master),
        }
    }

    pub(crate) fn from_buf(page: PageBuf) -> Self {
        Self { page }
    }

    /// Reads and validates the master page at `position`.
    pub fn load(file: &mut DbFile, position: u64, size: PageSize) -> Result<Self> {
        let bytes = file.read_exact(position, size.byte_length())?;
        Ok(Self::from_buf(PageBuf::read_from(
            bytes,
            position,
            PageType::Master,
        )?))
    }

    pub fn position(&self) -> u64 {
        self.page.position()
    }

    pub fn set_position(&mut self, position: u64) {
        self.page.set_position(position);
    }

    pub fn size(&self) -> PageSize {
        self.page.size()
    }

    pub fn bytes(&self) -> &[u8] {
        self.page.bytes()
    }

    pub fn next_offset(&self) -> u64 {
        self.page.next_offset()
    }

    pub fn next_reference(&self) -> Option<PageReference> {
        let next = self.page.next_offset();
        (next != 0).then_some(PageReference {
            size: self.page.size(),
            page_type: PageType::Master,
            position: next,
        })
    }

    /// Directory capacity of this page.
    pub fn entry_capacity(&self) -> usize {
        (self.page.len() - PAGE_HEADER_SIZE) / MASTER_ENTRY_SIZE
    }

    /// Number of used entries: a fresh scan that stops at the first zero
    /// file offset.
    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    /// Yields a `PageReference` per directory entry, in order, stopping at
    /// the first entry whose file offset is zero. Finite, and restartable
    /// by calling `entries` again.
    pub fn entries(&self) -> MasterEntries<'_> {
        MasterEntries {
            page: &self.page,
            index: 0,
        }
    }

    /// Registers a collection header page in the directory: appends the
    /// page's bytes at end-of-file, records its position, and writes a
    /// directory entry, spilling into a new linked master page when this
    /// one is full. Recurses into the chain tail first, so the entry always
    /// lands in the last master page.
    pub fn append(&mut self, file: &mut DbFile, header: &mut CollectionHeaderPage) -> Result<()> {
        if let Some(next) = self.next_reference() {
            let mut tail = MasterPage::load(file, next.position, next.size)?;
            return tail.append(file, header);
        }

        let position = file.append(header.bytes())?;
        header.set_position(position);

        self.register(
            file,
            PageReference {
                size: header.size(),
                page_type: PageType::CollectionHeader,
                position,
            },
        )
    }

    fn register(&mut self, file: &mut DbFile, entry: PageReference) -> Result<()> {
        // The master directory lists collection header pages only.
        ensure!(
            entry.page_type == PageType::CollectionHeader,
            StoreError::InvalidPage
        );

        let offset = PAGE_HEADER_SIZE + self.entry_count() * MASTER_ENTRY_SIZE;
        if offset + MASTER_ENTRY_SIZE > self.page.len() {
            let mut spill = MasterPage::new();
            let position = file.append(spill.bytes())?;
            spill.set_position(position);
            self.page.set_next_offset(position)?;
            self.page.flush(file)?;
            tracing::trace!(position, "allocated master spill page");
            return spill.register(file, entry);
        }

        let buf = self.page.bytes_mut();
        buf[offset] = entry.size as u8;
        buf[offset + 1] = entry.page_type as u8;
        self.page.write_slot(offset + 2, entry.position)?;
        self.page.flush(file)
    }
}

impl Default for MasterPage {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MasterEntries<'a> {
    page: &'a PageBuf,
    index: usize,
}

impl Iterator for MasterEntries<'_> {
    type Item = PageReference;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = PAGE_HEADER_SIZE + self.index * MASTER_ENTRY_SIZE;
        if offset + MASTER_ENTRY_SIZE > self.page.len() {
            return None;
        }
        let bytes = self.page.bytes();
        let position = self.page.read_slot(offset + 2).ok()?;
        if position == 0 {
            return None;
        }
        self.index += 1;
        Some(PageReference {
            size: PageSize::from_byte(bytes[offset]),
            page_type: PageType::from_byte(bytes[offset + 1]),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_file(dir: &tempfile::TempDir) -> DbFile {
        let mut file = DbFile::create(dir.path().join("t.db")).unwrap();
        // Keep offsets away from zero, as in a real file.
        file.append(&[0u8; 4]).unwrap();
        file
    }

    fn bootstrap_master(file: &mut DbFile) -> MasterPage {
        let mut master = MasterPage::new();
        let position = file.append(master.bytes()).unwrap();
        master.set_position(position);
        master
    }

    #[test]
    fn small_master_holds_99_entries() {
        assert_eq!(MasterPage::new().entry_capacity(), 99);
    }

    #[test]
    fn empty_master_iterates_nothing() {
        assert_eq!(MasterPage::new().entry_count(), 0);
    }

    #[test]
    fn append_then_iterate_roundtrips_in_order() {
        let dir = tempdir().unwrap();
        let mut file = test_file(&dir);
        let mut master = bootstrap_master(&mut file);

        let mut expected = Vec::new();
        for i in 0..10 {
            let mut header = CollectionHeaderPage::new(&format!("col{i}")).unwrap();
            master.append(&mut file, &mut header).unwrap();
            expected.push(header.position());
        }

        let positions: Vec<u64> = master.entries().map(|r| r.position).collect();
        assert_eq!(positions, expected);
        assert!(master
            .entries()
            .all(|r| r.page_type == PageType::CollectionHeader && r.size == PageSize::Small));
    }

    #[test]
    fn append_spills_into_linked_master_page() {
        let dir = tempdir().unwrap();
        let mut file = test_file(&dir);
        let mut master = bootstrap_master(&mut file);

        let mut expected = Vec::new();
        for i in 0..120 {
            let mut header = CollectionHeaderPage::new(&format!("col{i}")).unwrap();
            master.append(&mut file, &mut header).unwrap();
            expected.push(header.position());
        }

        assert_eq!(master.entry_count(), 99);
        let next = master.next_reference().expect("spill page must be linked");
        assert_eq!(next.page_type, PageType::Master);

        let tail = MasterPage::load(&mut file, next.position, next.size).unwrap();
        assert_eq!(tail.entry_count(), 21);

        let mut positions: Vec<u64> = master.entries().map(|r| r.position).collect();
        positions.extend(tail.entries().map(|r| r.position));
        assert_eq!(positions, expected);
    }

    #[test]
    fn spilled_chain_survives_reload() {
        let dir = tempdir().unwrap();
        let mut file = test_file(&dir);
        let mut master = bootstrap_master(&mut file);

        for i in 0..100 {
            let mut header = CollectionHeaderPage::new(&format!("col{i}")).unwrap();
            master.append(&mut file, &mut header).unwrap();
        }

        let reloaded = MasterPage::load(&mut file, master.position(), PageSize::Small).unwrap();
        assert_eq!(reloaded.entry_count(), 99);
        assert_ne!(reloaded.next_offset(), 0);
    }
}
