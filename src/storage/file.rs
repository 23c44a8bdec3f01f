//! # File Backend
//!
//! `DbFile` is a thin wrapper over one OS file handle supporting positioned
//! reads and writes plus append-at-end. The database owns exactly one
//! `DbFile`; every page and document operation borrows it per call.
//!
//! Reads return exactly the requested length; hitting end-of-file mid-read
//! fails with `StoreError::InvalidFileStructure`. Writes are not fsynced —
//! the format makes no crash-durability promise.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::error::StoreError;

#[derive(Debug)]
pub struct DbFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl DbFile {
    /// Creates a new, empty file. Fails with `NotAccessible` if the file
    /// already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .wrap_err(StoreError::NotAccessible(path.clone()))?;
        Ok(Self { file, path, len: 0 })
    }

    /// Opens an existing file read-write. Fails with `NotAccessible` if it
    /// cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err(StoreError::NotAccessible(path.clone()))?;
        let len = file
            .metadata()
            .wrap_err(StoreError::NotAccessible(path.clone()))?
            .len();
        Ok(Self { file, path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads exactly `len` bytes at `offset`. A short read fails with
    /// `InvalidFileStructure`.
    pub fn read_exact(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("seek to {offset} failed"))?;
        self.file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                eyre::Report::new(StoreError::InvalidFileStructure)
                    .wrap_err(format!("short read of {len} bytes at offset {offset}"))
            } else {
                eyre::Report::new(e).wrap_err(format!("read of {len} bytes at offset {offset} failed"))
            }
        })?;
        Ok(buf)
    }

    /// Writes `bytes` at `offset`, extending the file if the write reaches
    /// past the current end.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("seek to {offset} failed"))?;
        self.file
            .write_all(bytes)
            .wrap_err_with(|| format!("write of {} bytes at offset {offset} failed", bytes.len()))?;
        self.len = self.len.max(offset + bytes.len() as u64);
        Ok(())
    }

    /// Appends `bytes` at end-of-file, returning the offset they landed at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.write_at(offset, bytes)?;
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_returns_allocation_offsets() {
        let dir = tempdir().unwrap();
        let mut file = DbFile::create(dir.path().join("t.db")).unwrap();

        assert_eq!(file.append(b"abcd").unwrap(), 0);
        assert_eq!(file.append(b"efg").unwrap(), 4);
        assert_eq!(file.len(), 7);
    }

    #[test]
    fn read_back_what_was_written() {
        let dir = tempdir().unwrap();
        let mut file = DbFile::create(dir.path().join("t.db")).unwrap();
        file.append(b"hello world").unwrap();
        file.write_at(6, b"kaas!").unwrap();

        assert_eq!(file.read_exact(0, 11).unwrap(), b"hello kaas!");
    }

    #[test]
    fn short_read_fails_with_invalid_file_structure() {
        let dir = tempdir().unwrap();
        let mut file = DbFile::create(dir.path().join("t.db")).unwrap();
        file.append(b"xy").unwrap();

        let err = file.read_exact(0, 10).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        DbFile::create(&path).unwrap();

        let err = DbFile::create(&path).unwrap_err();
        assert!(matches!(
            StoreError::kind(&err),
            Some(StoreError::NotAccessible(_))
        ));
    }

    #[test]
    fn open_missing_file_fails_with_not_accessible() {
        let dir = tempdir().unwrap();

        let err = DbFile::open(dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(
            StoreError::kind(&err),
            Some(StoreError::NotAccessible(_))
        ));
    }

    #[test]
    fn write_past_end_extends_length() {
        let dir = tempdir().unwrap();
        let mut file = DbFile::create(dir.path().join("t.db")).unwrap();
        file.write_at(10, b"zz").unwrap();

        assert_eq!(file.len(), 12);
    }
}
