//! # Little-Endian Byte Codec
//!
//! Fixed-width integer and length-prefixed string encoding used by the page
//! and document layers. All multi-byte values are little-endian.
//!
//! ## Formats
//!
//! | Value | Encoding |
//! |-------|----------|
//! | `u32` | 4 bytes LE |
//! | `u64` | 8 bytes LE |
//! | string | 1-byte length (0-255), then UTF-8 bytes |
//!
//! All functions operate on byte slices at an explicit offset and perform no
//! heap allocation on the read path. A source slice shorter than required
//! fails with `StoreError::InvalidFileStructure`.

use eyre::{ensure, Result};

use crate::error::StoreError;

/// Longest encodable string payload: the length prefix is a single byte.
pub const MAX_STRING_LEN: usize = 255;

pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let end = offset.checked_add(4).ok_or(StoreError::InvalidFileStructure)?;
    ensure!(buf.len() >= end, StoreError::InvalidFileStructure);
    let bytes: [u8; 4] = buf[offset..end]
        .try_into()
        .map_err(|_| StoreError::InvalidFileStructure)?;
    Ok(u32::from_le_bytes(bytes))
}

pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64> {
    let end = offset.checked_add(8).ok_or(StoreError::InvalidFileStructure)?;
    ensure!(buf.len() >= end, StoreError::InvalidFileStructure);
    let bytes: [u8; 8] = buf[offset..end]
        .try_into()
        .map_err(|_| StoreError::InvalidFileStructure)?;
    Ok(u64::from_le_bytes(bytes))
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let end = offset.checked_add(4).ok_or(StoreError::InvalidFileStructure)?;
    ensure!(buf.len() >= end, StoreError::InvalidFileStructure);
    buf[offset..end].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) -> Result<()> {
    let end = offset.checked_add(8).ok_or(StoreError::InvalidFileStructure)?;
    ensure!(buf.len() >= end, StoreError::InvalidFileStructure);
    buf[offset..end].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Decodes a length-prefixed string, returning the string and the number of
/// bytes consumed (1 + length).
pub fn read_string(buf: &[u8], offset: usize) -> Result<(&str, usize)> {
    ensure!(buf.len() > offset, StoreError::InvalidFileStructure);
    let len = buf[offset] as usize;
    ensure!(
        buf.len() >= offset + 1 + len,
        StoreError::InvalidFileStructure
    );
    let s = std::str::from_utf8(&buf[offset + 1..offset + 1 + len])
        .map_err(|_| StoreError::InvalidFileStructure)?;
    Ok((s, 1 + len))
}

/// Encodes a length-prefixed string into `buf` at `offset`, returning the
/// number of bytes written. The string must encode to at most 255 bytes.
pub fn write_string(buf: &mut [u8], offset: usize, s: &str) -> Result<usize> {
    ensure!(
        s.len() <= MAX_STRING_LEN,
        "string too long for 1-byte length prefix: {} bytes",
        s.len()
    );
    ensure!(
        buf.len() >= offset + 1 + s.len(),
        StoreError::InvalidFileStructure
    );
    buf[offset] = s.len() as u8;
    buf[offset + 1..offset + 1 + s.len()].copy_from_slice(s.as_bytes());
    Ok(1 + s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_roundtrip() {
        let mut buf = [0u8; 8];
        write_u32(&mut buf, 2, 0xDEAD_BEEF).unwrap();

        assert_eq!(read_u32(&buf, 2).unwrap(), 0xDEAD_BEEF);
        assert_eq!(&buf[2..6], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn u64_roundtrip() {
        let mut buf = [0u8; 16];
        write_u64(&mut buf, 3, u64::MAX - 7).unwrap();

        assert_eq!(read_u64(&buf, 3).unwrap(), u64::MAX - 7);
    }

    #[test]
    fn short_buffer_fails_with_invalid_file_structure() {
        let buf = [0u8; 6];

        let err = read_u64(&buf, 0).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );

        let err = read_u32(&buf, 5).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = [0u8; 32];
        let written = write_string(&mut buf, 4, "kaas").unwrap();

        assert_eq!(written, 5);
        assert_eq!(buf[4], 4);
        let (s, consumed) = read_string(&buf, 4).unwrap();
        assert_eq!(s, "kaas");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn empty_string_roundtrip() {
        let mut buf = [0u8; 4];
        write_string(&mut buf, 0, "").unwrap();

        let (s, consumed) = read_string(&buf, 0).unwrap();
        assert_eq!(s, "");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn string_truncated_payload_fails() {
        let mut buf = [0u8; 4];
        buf[0] = 10;

        let err = read_string(&buf, 0).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let buf = [2u8, 0xFF, 0xFE];

        assert!(read_string(&buf, 0).is_err());
    }
}
