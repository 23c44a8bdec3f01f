//! # Page Types and Header Layout
//!
//! Every page begins with a 10-byte header: a page-size discriminant, a
//! page-type discriminant, and the file offset of the next page in this
//! page's chain (zero when there is none). The body layout depends on the
//! type and is implemented by the `master` and `collection_page` modules.
//!
//! ## Validation
//!
//! A page buffer is structurally valid when:
//!
//! - it is at least 10 bytes long,
//! - byte 0 decodes to a real page size (never the `None` sentinel),
//! - that size's byte length equals the buffer length,
//! - byte 1 equals the type expected by the containing chain.
//!
//! Any violation fails with `StoreError::InvalidPage`. Validation happens
//! once, when a page is read from disk; in-memory pages are constructed
//! valid and stay that way.
//!
//! ## Zero-Copy Header
//!
//! The `PageHeader` struct uses `zerocopy` for safe transmutation from the
//! first 10 bytes of a page buffer, so header reads and the next-pointer
//! rewrite never copy or re-encode the whole page.

use eyre::{bail, ensure, Result, WrapErr};
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::encoding;
use crate::error::StoreError;

use super::collection_page::{CollectionBodyPage, CollectionHeaderPage, SlotPage};
use super::master::MasterPage;
use super::{DbFile, MEDIUM_PAGE_SIZE, PAGE_HEADER_SIZE, SMALL_PAGE_SIZE};

/// Page-size discriminant stored in byte 0 of every page. `None` is a
/// decoding-failure sentinel and is never written to disk.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    None = 0,
    Small = 1,
    Medium = 2,
}

impl PageSize {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => PageSize::Small,
            2 => PageSize::Medium,
            _ => PageSize::None,
        }
    }

    /// On-disk length of a page of this size; zero for the sentinel.
    pub fn byte_length(&self) -> usize {
        match self {
            PageSize::None => 0,
            PageSize::Small => SMALL_PAGE_SIZE,
            PageSize::Medium => MEDIUM_PAGE_SIZE,
        }
    }
}

/// Page-type discriminant stored in byte 1. `Unknown` and `Index` are
/// reserved; readers reject both.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Unknown = 0,
    Master = 1,
    CollectionHeader = 2,
    CollectionBody = 3,
    Index = 4,
}

impl PageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => PageType::Master,
            2 => PageType::CollectionHeader,
            3 => PageType::CollectionBody,
            4 => PageType::Index,
            _ => PageType::Unknown,
        }
    }
}

/// The 10-byte header shared by every page.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PageHeader {
    size: u8,
    page_type: u8,
    next: U64,
}

const _: () = assert!(std::mem::size_of::<PageHeader>() == PAGE_HEADER_SIZE);

impl PageHeader {
    pub fn new(size: PageSize, page_type: PageType) -> Self {
        Self {
            size: size as u8,
            page_type: page_type as u8,
            next: U64::new(0),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(data.len() >= PAGE_HEADER_SIZE, StoreError::InvalidPage);
        Self::ref_from_bytes(&data[..PAGE_HEADER_SIZE]).map_err(|_| StoreError::InvalidPage.into())
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(data.len() >= PAGE_HEADER_SIZE, StoreError::InvalidPage);
        Self::mut_from_bytes(&mut data[..PAGE_HEADER_SIZE])
            .map_err(|_| StoreError::InvalidPage.into())
    }

    pub fn size(&self) -> PageSize {
        PageSize::from_byte(self.size)
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_byte(self.page_type)
    }

    pub fn next_offset(&self) -> u64 {
        self.next.get()
    }

    pub fn set_next_offset(&mut self, offset: u64) {
        self.next = U64::new(offset);
    }
}

/// A value pointing at a page on disk: size, type, and file offset. The
/// referenced bytes live in the file; the reference owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReference {
    pub size: PageSize,
    pub page_type: PageType,
    pub position: u64,
}

/// An in-memory page buffer plus the file position it was read from (or
/// will be appended to). Constructed either fresh-and-valid or via
/// `read_from`, which validates; accessors after that point are infallible.
#[derive(Debug, Clone)]
pub struct PageBuf {
    bytes: Vec<u8>,
    position: u64,
}

impl PageBuf {
    /// A zeroed page of the given size with its header initialized.
    pub fn new(size: PageSize, page_type: PageType) -> Self {
        let mut bytes = vec![0u8; size.byte_length()];
        bytes[0] = size as u8;
        bytes[1] = page_type as u8;
        Self { bytes, position: 0 }
    }

    /// Validates a buffer read from `position` and wraps it. All four
    /// structural rules are checked here.
    pub fn read_from(bytes: Vec<u8>, position: u64, expected: PageType) -> Result<Self> {
        ensure!(bytes.len() >= PAGE_HEADER_SIZE, StoreError::InvalidPage);
        let size = PageSize::from_byte(bytes[0]);
        ensure!(size != PageSize::None, StoreError::InvalidPage);
        ensure!(size.byte_length() == bytes.len(), StoreError::InvalidPage);
        ensure!(
            PageType::from_byte(bytes[1]) == expected,
            StoreError::InvalidPage
        );
        Ok(Self { bytes, position })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    pub fn size(&self) -> PageSize {
        PageSize::from_byte(self.bytes[0])
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_byte(self.bytes[1])
    }

    pub fn next_offset(&self) -> u64 {
        // The buffer is always at least header-sized by construction.
        encoding::read_u64(&self.bytes, 2).unwrap_or(0)
    }

    pub fn set_next_offset(&mut self, offset: u64) -> Result<()> {
        let header = PageHeader::from_bytes_mut(&mut self.bytes)?;
        header.set_next_offset(offset);
        Ok(())
    }

    pub fn read_slot(&self, offset: usize) -> Result<u64> {
        encoding::read_u64(&self.bytes, offset)
    }

    pub fn write_slot(&mut self, offset: usize, value: u64) -> Result<()> {
        encoding::write_u64(&mut self.bytes, offset, value)
    }

    /// Writes the whole page back to its file position.
    pub fn flush(&self, file: &mut DbFile) -> Result<()> {
        file.write_at(self.position, &self.bytes)
    }
}

/// The tagged sum over concrete page variants, used where a chain pointer
/// must be followed without knowing the variant statically.
#[derive(Debug)]
pub enum Page {
    Master(MasterPage),
    CollectionHeader(CollectionHeaderPage),
    CollectionBody(CollectionBodyPage),
}

impl Page {
    /// Reads `reference.size.byte_length()` bytes at the reference's offset,
    /// picks the concrete variant from the type byte, and validates. The
    /// reserved types (`Unknown`, `Index`) and any disagreement between the
    /// reference and the bytes on disk fail with `InvalidPage`.
    pub fn resolve(file: &mut DbFile, reference: &PageReference) -> Result<Page> {
        ensure!(reference.position != 0, StoreError::InvalidPage);
        let len = reference.size.byte_length();
        ensure!(len >= PAGE_HEADER_SIZE, StoreError::InvalidPage);

        let bytes = file
            .read_exact(reference.position, len)
            .wrap_err_with(|| format!("failed to read page at offset {}", reference.position))?;
        let actual = PageType::from_byte(bytes[1]);
        ensure!(actual == reference.page_type, StoreError::InvalidPage);

        match actual {
            PageType::Master => Ok(Page::Master(MasterPage::from_buf(PageBuf::read_from(
                bytes,
                reference.position,
                PageType::Master,
            )?))),
            PageType::CollectionHeader => Ok(Page::CollectionHeader(
                CollectionHeaderPage::from_buf(PageBuf::read_from(
                    bytes,
                    reference.position,
                    PageType::CollectionHeader,
                )?)?,
            )),
            PageType::CollectionBody => Ok(Page::CollectionBody(CollectionBodyPage::from_buf(
                PageBuf::read_from(bytes, reference.position, PageType::CollectionBody)?,
            ))),
            PageType::Unknown | PageType::Index => bail!(StoreError::InvalidPage),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            Page::Master(_) => PageType::Master,
            Page::CollectionHeader(_) => PageType::CollectionHeader,
            Page::CollectionBody(_) => PageType::CollectionBody,
        }
    }

    /// Reference to this page's chain successor, if any. The successor type
    /// follows the chain invariant: master chains stay master, collection
    /// chains continue with body pages.
    pub fn next_reference(&self) -> Option<PageReference> {
        match self {
            Page::Master(p) => p.next_reference(),
            Page::CollectionHeader(p) => p.next_reference(),
            Page::CollectionBody(p) => p.next_reference(),
        }
    }
}
