//! # Collection Pages
//!
//! A collection is a chain of one header page and zero or more body pages.
//! The header carries the collection name; both kinds carry an array of
//! 8-byte document slots, each holding the file offset of a length-prefixed
//! document payload. A zero slot is empty and terminates iteration.
//!
//! ## Body Layouts
//!
//! ```text
//! header page:  offset 10   name_len (u8)
//!               offset 11   name (UTF-8)
//!               offset 11+L slots (8 bytes LE each)
//!
//! body page:    offset 10   slots (8 bytes LE each)
//! ```
//!
//! ## Slot Protocol
//!
//! Both page kinds share the protocol through [`SlotPage`]: iteration stops
//! at the first zero slot (not at end of page), and the append position is
//! computed from that same first-zero count. The on-disk format cannot tell
//! "never used" from "removed", so removing a non-tail entry truncates the
//! visible tail of its page; removals are expected to be tail-first or
//! whole-collection in practice.

use eyre::{ensure, Result, WrapErr};

use crate::encoding;
use crate::error::StoreError;

use super::page::{PageBuf, PageReference, PageSize, PageType};
use super::{DbFile, PAGE_HEADER_SIZE, SLOT_SIZE};

/// Leading u32 length every document payload starts with.
const PAYLOAD_LENGTH_PREFIX: usize = 4;

/// Locates one document slot: the payload's file offset, the slot's byte
/// offset within its page, and the page's file position (needed to rewrite
/// the slot on update/remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentReference {
    pub document_position: u64,
    pub slot_offset: usize,
    pub page_position: u64,
}

/// The slot-array protocol shared by header and body pages.
pub trait SlotPage {
    fn page(&self) -> &PageBuf;
    fn page_mut(&mut self) -> &mut PageBuf;

    /// Byte offset of the first slot: 10 for a body page, `11 + name_len`
    /// for a header page.
    fn first_entry_offset(&self) -> usize;

    /// Reference to the next body page in this collection's chain, if any.
    fn next_reference(&self) -> Option<PageReference> {
        let next = self.page().next_offset();
        (next != 0).then_some(PageReference {
            size: self.page().size(),
            page_type: PageType::CollectionBody,
            position: next,
        })
    }

    /// Yields a `DocumentReference` per non-zero slot, in order, stopping
    /// at the first zero slot.
    fn entries(&self) -> SlotEntries<'_> {
        SlotEntries {
            page: self.page(),
            offset: self.first_entry_offset(),
        }
    }

    /// Number of live slots, from a fresh first-zero-terminated scan.
    fn entry_count(&self) -> usize {
        self.entries().count()
    }

    /// Appends a document payload to the collection: walks to the chain
    /// tail, writes the payload at end-of-file, and records its offset in
    /// the next free slot, spilling into a new linked body page when this
    /// one is full.
    fn append(&mut self, file: &mut DbFile, payload: &[u8]) -> Result<DocumentReference> {
        if let Some(next) = self.next_reference() {
            let mut tail = CollectionBodyPage::resolve(file, &next)?;
            return tail.append(file, payload);
        }

        let position = file.append(payload)?;
        self.register_slot(file, position)
    }

    /// Writes a slot for an already-appended payload, allocating and
    /// linking a body page first when the slot array is full.
    fn register_slot(&mut self, file: &mut DbFile, position: u64) -> Result<DocumentReference> {
        let offset = self.first_entry_offset() + self.entry_count() * SLOT_SIZE;
        if offset + SLOT_SIZE > self.page().len() {
            let mut spill = CollectionBodyPage::new();
            let spill_position = file.append(spill.page().bytes())?;
            spill.page_mut().set_position(spill_position);
            self.page_mut().set_next_offset(spill_position)?;
            self.page().flush(file)?;
            tracing::trace!(position = spill_position, "allocated collection body page");
            return spill.register_slot(file, position);
        }

        self.page_mut().write_slot(offset, position)?;
        self.page().flush(file)?;
        Ok(DocumentReference {
            document_position: position,
            slot_offset: offset,
            page_position: self.page().position(),
        })
    }

    /// Replaces the referenced document. If the new payload fits in the
    /// existing one's footprint it is overwritten in place; otherwise the
    /// new payload is appended at end-of-file and the slot is rewritten.
    /// Returns the payload's position after the update.
    fn update(
        &mut self,
        file: &mut DbFile,
        reference: &DocumentReference,
        payload: &[u8],
    ) -> Result<u64> {
        self.check_slot(reference)?;

        let prefix = file
            .read_exact(reference.document_position, PAYLOAD_LENGTH_PREFIX)
            .wrap_err(StoreError::InvalidDocumentReference)?;
        let existing_len = encoding::read_u32(&prefix, 0)? as usize;
        ensure!(
            existing_len >= PAYLOAD_LENGTH_PREFIX,
            StoreError::InvalidDocumentReference
        );

        if existing_len >= payload.len() {
            file.write_at(reference.document_position, payload)?;
            return Ok(reference.document_position);
        }

        let position = file.append(payload)?;
        self.page_mut().write_slot(reference.slot_offset, position)?;
        self.page().flush(file)?;
        Ok(position)
    }

    /// Zeroes the referenced slot and rewrites the page. The document bytes
    /// stay behind as dead space.
    fn remove(&mut self, file: &mut DbFile, reference: &DocumentReference) -> Result<()> {
        self.check_slot(reference)?;
        self.page_mut().write_slot(reference.slot_offset, 0)?;
        self.page().flush(file)
    }

    fn check_slot(&self, reference: &DocumentReference) -> Result<()> {
        ensure!(
            reference.slot_offset > 0
                && reference.slot_offset + SLOT_SIZE <= self.page().len(),
            StoreError::InvalidDocumentReference
        );
        Ok(())
    }
}

pub struct SlotEntries<'a> {
    page: &'a PageBuf,
    offset: usize,
}

impl Iterator for SlotEntries<'_> {
    type Item = DocumentReference;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + SLOT_SIZE > self.page.len() {
            return None;
        }
        let position = self.page.read_slot(self.offset).ok()?;
        if position == 0 {
            return None;
        }
        let reference = DocumentReference {
            document_position: position,
            slot_offset: self.offset,
            page_position: self.page.position(),
        };
        self.offset += SLOT_SIZE;
        Some(reference)
    }
}

/// The root page of a collection; carries the collection name.
#[derive(Debug, Clone)]
pub struct CollectionHeaderPage {
    page: PageBuf,
    name_len: usize,
}

impl CollectionHeaderPage {
    /// A fresh Small header page (not yet on disk). The name must encode to
    /// at most 255 bytes.
    pub fn new(name: &str) -> Result<Self> {
        let mut page = PageBuf::new(PageSize::Small, PageType::CollectionHeader);
        encoding::write_string(page.bytes_mut(), PAGE_HEADER_SIZE, name)?;
        Ok(Self {
            page,
            name_len: name.len(),
        })
    }

    /// Wraps a validated buffer, additionally checking the name region.
    pub(crate) fn from_buf(page: PageBuf) -> Result<Self> {
        let (_, consumed) = encoding::read_string(page.bytes(), PAGE_HEADER_SIZE)
            .wrap_err(StoreError::InvalidPage)?;
        Ok(Self {
            page,
            name_len: consumed - 1,
        })
    }

    /// Reads and validates the header page a reference points at.
    pub fn resolve(file: &mut DbFile, reference: &PageReference) -> Result<Self> {
        ensure!(
            reference.page_type == PageType::CollectionHeader,
            StoreError::InvalidPage
        );
        let bytes = file.read_exact(reference.position, reference.size.byte_length())?;
        Self::from_buf(PageBuf::read_from(
            bytes,
            reference.position,
            PageType::CollectionHeader,
        )?)
    }

    pub fn name(&self) -> &str {
        // The name region was validated as UTF-8 on construction.
        std::str::from_utf8(
            &self.page.bytes()[PAGE_HEADER_SIZE + 1..PAGE_HEADER_SIZE + 1 + self.name_len],
        )
        .unwrap_or("")
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
}

impl SlotPage for CollectionHeaderPage {
    fn page(&self) -> &PageBuf {
        &self.page
    }

    fn page_mut(&mut self) -> &mut PageBuf {
        &mut self.page
    }

    fn first_entry_offset(&self) -> usize {
        PAGE_HEADER_SIZE + 1 + self.name_len
    }
}

/// A continuation page in a collection's chain; slots only, no name.
#[derive(Debug, Clone)]
pub struct CollectionBodyPage {
    page: PageBuf,
}

impl CollectionBodyPage {
    pub fn new() -> Self {
        Self {
            page: PageBuf::new(PageSize::Small, PageType::CollectionBody),
        }
    }

    pub(crate) fn from_buf(page: PageBuf) -> Self {
        Self { page }
    }

    /// Reads and validates the body page a reference points at.
    pub fn resolve(file: &mut DbFile, reference: &PageReference) -> Result<Self> {
        ensure!(
            reference.page_type == PageType::CollectionBody,
            StoreError::InvalidPage
        );
        let bytes = file.read_exact(reference.position, reference.size.byte_length())?;
        Ok(Self::from_buf(PageBuf::read_from(
            bytes,
            reference.position,
            PageType::CollectionBody,
        )?))
    }

    pub fn position(&self) -> u64 {
        self.page.position()
    }

    pub fn next_offset(&self) -> u64 {
        self.page.next_offset()
    }
}

impl SlotPage for CollectionBodyPage {
    fn page(&self) -> &PageBuf {
        &self.page
    }

    fn page_mut(&mut self) -> &mut PageBuf {
        &mut self.page
    }

    fn first_entry_offset(&self) -> usize {
        PAGE_HEADER_SIZE
    }
}

impl Default for CollectionBodyPage {
    fn default() -> Self {
        Self::new()
    }
}
